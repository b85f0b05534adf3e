//! KGRAG Console
//!
//! Interactive question loop over the retrieval pipeline. Reads one question
//! per line, prints the answer, and exits on an exit keyword, EOF or Ctrl+C.

use futures::FutureExt;
use kgrag_common::{
    config::{AppConfig, ObservabilityConfig},
    graph::Neo4jHttpStore,
    inference::HttpGenerationTransport,
    linking::DictionaryLinker,
    schema::KnowledgeSchema,
    RetrievalOrchestrator,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EXIT_KEYWORDS: &[&str] = &["退出", "exit", "quit"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!("Starting KGRAG Console v{}", kgrag_common::VERSION);

    let schema = Arc::new(match &config.schema_path {
        Some(path) => KnowledgeSchema::from_file(path)?,
        None => KnowledgeSchema::medical(),
    });
    let linker = Arc::new(DictionaryLinker::from_dir(&config.linker.dict_dir)?);
    let graph = Arc::new(Neo4jHttpStore::new(&config.graph)?);
    let transport = Arc::new(HttpGenerationTransport::new(&config.generation)?);
    let orchestrator = RetrievalOrchestrator::new(&config, schema, linker, graph, transport);

    println!("[INFO] 知识图谱问答已就绪，输入'退出'或按Ctrl+C退出程序\n");

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = run(&orchestrator, config.request_timeout(), stdin, stdout) => result?,
        _ = signal::ctrl_c() => {},
    }

    println!("\n[INFO] 程序已退出");
    Ok(())
}

/// Console logs go to stderr so answers stay readable on stdout
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn is_exit(line: &str) -> bool {
    EXIT_KEYWORDS.iter().any(|k| line.eq_ignore_ascii_case(k))
}

/// Question loop; returns on an exit keyword or EOF
async fn run<R, W>(
    orchestrator: &RetrievalOrchestrator,
    deadline: Duration,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        output.write_all(b"USER:").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            break;
        }

        // A panic while answering must not end the session
        let attempt = AssertUnwindSafe(orchestrator.answer_within(question, deadline));
        let reply = match attempt.catch_unwind().await {
            Ok(Ok(answer)) => format!("KGRAG_BOT: {}\n", answer.display_text()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Question failed");
                format!("[ERROR] 处理问题时出错: {}\n", e)
            }
            Err(_) => {
                tracing::error!("Question handling panicked");
                "[ERROR] 处理问题时出错: 内部错误\n".to_string()
            }
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kgrag_common::errors::{AppError, Result};
    use kgrag_common::graph::{GraphPath, GraphStore};
    use kgrag_common::inference::{GenerationRequest, GenerationResponse, GenerationTransport};
    use kgrag_common::linking::{Entity, EntityLinker, LinkedEntities};
    use kgrag_common::NO_ENTITY_ANSWER;

    struct ColdLinker;

    #[async_trait]
    impl EntityLinker for ColdLinker {
        async fn link(&self, question: &str) -> Result<LinkedEntities> {
            if question.contains("崩") {
                panic!("linker state corrupted");
            }
            if question.contains("坏") {
                return Err(AppError::Linking { message: "dictionary unavailable".into() });
            }
            if question.contains("感冒") {
                Ok(vec![Entity::new("感冒", ["disease"])])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct EmptyGraph;

    #[async_trait]
    impl GraphStore for EmptyGraph {
        async fn paths(&self, _label: &str, _name: &str, _depth: u32) -> Result<Vec<GraphPath>> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    struct FixedModel;

    #[async_trait]
    impl GenerationTransport for FixedModel {
        async fn send(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
            Ok(GenerationResponse { output: vec!["多喝水".to_string()], history: None })
        }
    }

    fn orchestrator() -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(
            &AppConfig::default(),
            Arc::new(KnowledgeSchema::medical()),
            Arc::new(ColdLinker),
            Arc::new(EmptyGraph),
            Arc::new(FixedModel),
        )
    }

    async fn transcript(input: &'static str) -> String {
        let stdin = tokio_test::io::Builder::new().read(input.as_bytes()).build();
        let mut out = Vec::new();
        run(&orchestrator(), Duration::from_secs(5), BufReader::new(stdin), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_exit_keywords() {
        assert!(is_exit("退出"));
        assert!(is_exit("EXIT"));
        assert!(is_exit("Quit"));
        assert!(!is_exit("exit now"));
    }

    #[tokio::test]
    async fn test_answers_until_exit() {
        let out = transcript("感冒怎么办\n\nquit\n今天天气\n").await;
        assert_eq!(out.matches("KGRAG_BOT: ").count(), 1);
        assert!(out.contains("KGRAG_BOT: 多喝水\n"));
        assert!(!out.contains(NO_ENTITY_ANSWER));
    }

    #[tokio::test]
    async fn test_eof_ends_loop() {
        let out = transcript("今天天气\n").await;
        assert!(out.contains(&format!("KGRAG_BOT: {}\n", NO_ENTITY_ANSWER)));
        assert!(out.ends_with("USER:"));
    }

    #[tokio::test]
    async fn test_failed_question_keeps_loop_alive() {
        let out = transcript("坏问题\n感冒了\n").await;
        assert!(out.contains("[ERROR] "));
        assert!(out.contains("KGRAG_BOT: 多喝水\n"));
    }

    #[tokio::test]
    async fn test_panic_keeps_loop_alive() {
        let out = transcript("崩溃了\n感冒了\n").await;
        assert!(out.contains("[ERROR] 处理问题时出错: 内部错误\n"));
        assert!(out.contains("KGRAG_BOT: 多喝水\n"));
    }
}
