//! Prompt assembly
//!
//! Renders ranked evidence and the question into one instruction prompt. The
//! closing instructions tell the model to answer in Chinese, say which
//! relations to prefer per question intent, and forbid refusals: a cautious
//! best-effort answer is always preferred over "I don't know".

use super::fact::Fact;

/// Rendered in place of the evidence list when there is no evidence
pub const NO_FACTS_PLACEHOLDER: &str = "无相关三元组";

const PREAMBLE: &str = "你是一个医疗知识问答助手。请根据以下知识三元组回答问题。";

const EVIDENCE_HEADER: &str = "知识三元组（格式：<实体, 关系, 值>）：";

const INSTRUCTIONS: &str = "请仔细阅读上述知识三元组，找出与问题直接相关的信息，并用简洁、专业的中文回答问题。回答时要：
1. 优先使用与问题中提到的实体直接相关的三元组
2. 如果问题问\"怎么办\"或\"如何治疗\"，重点关注\"治疗方式\"、\"常用药品\"、\"治疗科室\"等关系
3. 如果问题问\"原因\"或\"病因\"，重点关注\"疾病病因\"关系
4. 如果问题问\"症状\"，重点关注\"症状\"关系
5. 不要回答不知道或抱歉；即使信息有限，也请结合三元组给出保守的建议（如常见治疗方式、就诊科室、常见药物、预防措施）";

/// Builds the generation prompt
pub struct PromptAssembler {
    max_items: usize,
}

impl PromptAssembler {
    /// `max_items` caps rendered evidence lines independently of ranking
    pub fn new(max_items: usize) -> Self {
        Self { max_items }
    }

    pub fn assemble(&self, question: &str, evidence: &[Fact]) -> String {
        let evidence_section = self.render_evidence(evidence);
        format!(
            "{PREAMBLE}\n\n{EVIDENCE_HEADER}\n{evidence_section}\n\n用户问题：{question}\n\n{INSTRUCTIONS}\n\n回答："
        )
    }

    fn render_evidence(&self, evidence: &[Fact]) -> String {
        if evidence.is_empty() {
            return NO_FACTS_PLACEHOLDER.to_string();
        }

        evidence
            .iter()
            .take(self.max_items)
            .enumerate()
            .map(|(i, fact)| format!("  {}. {}", i + 1, fact))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_evidence() {
        let evidence = vec![
            Fact::direct("头痛", "治疗方式", "对症治疗"),
            Fact::indirect("偏头痛", "症状", "头痛"),
        ];
        let prompt = PromptAssembler::default().assemble("我头痛怎么办", &evidence);

        assert!(prompt.contains("  1. <头痛,治疗方式,对症治疗>\n  2. <偏头痛,症状,头痛>"));
        assert!(prompt.contains("用户问题：我头痛怎么办"));
        assert!(prompt.ends_with("回答："));
    }

    #[test]
    fn test_empty_evidence_placeholder() {
        let prompt = PromptAssembler::default().assemble("头痛是什么原因", &[]);
        assert!(prompt.contains(&format!("{}\n{}\n", EVIDENCE_HEADER, NO_FACTS_PLACEHOLDER)));
        assert!(!prompt.contains("  1. "));
    }

    #[test]
    fn test_outer_cap() {
        let evidence: Vec<Fact> = (0..80)
            .map(|i| Fact::direct("感冒", "症状", format!("症状{}", i)))
            .collect();
        let prompt = PromptAssembler::default().assemble("感冒有什么症状", &evidence);

        assert!(prompt.contains("  50. <感冒,症状,症状49>"));
        assert!(!prompt.contains("  51. "));
    }

    #[test]
    fn test_instructions_forbid_refusal() {
        let prompt = PromptAssembler::default().assemble("q", &[]);
        assert!(prompt.contains("不要回答不知道或抱歉"));
        assert!(prompt.contains("重点关注\"疾病病因\"关系"));
    }
}
