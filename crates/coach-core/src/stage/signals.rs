//! Per-stage signal detection.
//!
//! A [`SignalDetector`] inspects one user utterance and reports which flags it
//! raises for the current stage. [`update_stage_signals`] folds that delta into
//! the prior flags; flags are sticky until the stage changes.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Stage;

/// Sticky per-stage boolean flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageSignalFlags {
    pub has_intro_or_context: bool,
    pub has_project_or_role: bool,
    pub has_specificity: bool,
    pub asked_advice: bool,
    pub has_thanks_followup: bool,
}

impl StageSignalFlags {
    /// Flags set in either `self` or `delta`.
    pub fn merge(&self, delta: &StageSignalFlags) -> StageSignalFlags {
        StageSignalFlags {
            has_intro_or_context: self.has_intro_or_context || delta.has_intro_or_context,
            has_project_or_role: self.has_project_or_role || delta.has_project_or_role,
            has_specificity: self.has_specificity || delta.has_specificity,
            asked_advice: self.asked_advice || delta.asked_advice,
            has_thanks_followup: self.has_thanks_followup || delta.has_thanks_followup,
        }
    }

    /// Whether the completion signal for `stage` has been observed.
    pub fn satisfies(&self, stage: Stage) -> bool {
        match stage {
            Stage::SmallTalk => self.has_intro_or_context || self.has_project_or_role,
            Stage::Experience => self.has_specificity,
            Stage::Advice => self.asked_advice,
            Stage::WrapUp => self.has_thanks_followup,
            Stage::Done => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == StageSignalFlags::default()
    }
}

/// Strategy for turning an utterance into a flag delta.
pub trait SignalDetector: Send + Sync {
    /// Flags raised by `content` while in `stage`. Never clears a flag.
    fn detect(&self, stage: Stage, content: &str) -> StageSignalFlags;
}

/// Fold a detector's delta into the prior flags.
pub fn update_stage_signals(
    detector: &dyn SignalDetector,
    stage: Stage,
    prior: &StageSignalFlags,
    latest_user_content: &str,
) -> StageSignalFlags {
    prior.merge(&detector.detect(stage, latest_user_content))
}

const INTRO_OR_CONTEXT: &[&str] = &[
    r"(?i)(?-u:\b)(i am|i'm)\s+(a|an|the)(?-u:\b)",
    r"(?i)(?-u:\b)(i am|i'm)\s+(currently|recently)(?-u:\b)",
    r"(?i)(?-u:\b)(currently|recently)(?-u:\b)",
    r"(?i)(?-u:\b)(study|student|intern|engineer|manager)(?-u:\b)",
    r"(?i)(?-u:\b)my background(?-u:\b)",
    r"我(是|现在|目前|最近)",
    r"最近在",
];

const PROJECT_OR_ROLE: &[&str] = &[
    r"(?i)(?-u:\b)(project|team|role|company|collaborat|scope)(?-u:\b)",
    r"项目",
    r"团队",
    r"岗位",
    r"公司",
    r"工作内容",
];

const EXPERIENCE_SPECIFICITY: &[&str] = &[
    r"(?i)(?-u:\b)[0-9]+(\.[0-9]+)?(%|ms|s|sec|minutes|min|hrs|hours|k|m)?(?-u:\b)",
    r"(?i)(?-u:\b)(metric|impact|improv|increase|reduce)(?-u:\b)",
    r"(?i)(?-u:\b)(latency|throughput|cost|scale|scalability)(?-u:\b)",
    r"(?i)(?-u:\b)(trade-?off|constraint|decision|risk)(?-u:\b)",
    r"(?i)(?-u:\b)(i (owned|led|built|implemented|designed|shipped))(?-u:\b)",
    r"指标|提升|优化|降低|权衡|取舍|限制|决定|我(负责|主导|实现|设计|上线)",
];

const ADVICE_REQUEST: &[&str] = &[
    r"(?i)(?-u:\b)(advice|recommend|suggest|tips?)(?-u:\b)",
    r"(?i)(?-u:\b)(recruit|recruiting|interview|job search)(?-u:\b)",
    r"你建议",
    r"有什么建议",
    r"怎么(做|准备|提升)",
    r"可以推荐",
];

const WRAP_UP: &[&str] = &[
    r"(?i)(?-u:\b)(thank|thanks|appreciate)(?-u:\b)",
    r"(?i)(?-u:\b)(follow[- ]?up|email|connect|stay in touch|next step)(?-u:\b)",
    r"谢谢|感谢",
    r"回头.*(邮件|email)",
    r"保持联系",
];

pub(crate) fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn any_match(patterns: &[Regex], content: &str) -> bool {
    !content.is_empty() && patterns.iter().any(|re| re.is_match(content))
}

/// Keyword/pattern based detector (English and Chinese phrasings).
///
/// Word boundaries and digits are ASCII-only, so an English keyword directly
/// after Chinese text still matches.
pub struct PatternSignalDetector {
    intro_or_context: Vec<Regex>,
    project_or_role: Vec<Regex>,
    specificity: Vec<Regex>,
    advice_request: Vec<Regex>,
    wrap_up: Vec<Regex>,
}

impl Default for PatternSignalDetector {
    fn default() -> Self {
        Self {
            intro_or_context: compile(INTRO_OR_CONTEXT),
            project_or_role: compile(PROJECT_OR_ROLE),
            specificity: compile(EXPERIENCE_SPECIFICITY),
            advice_request: compile(ADVICE_REQUEST),
            wrap_up: compile(WRAP_UP),
        }
    }
}

impl SignalDetector for PatternSignalDetector {
    fn detect(&self, stage: Stage, content: &str) -> StageSignalFlags {
        let mut delta = StageSignalFlags::default();

        match stage {
            Stage::SmallTalk => {
                delta.has_intro_or_context = any_match(&self.intro_or_context, content);
                delta.has_project_or_role = any_match(&self.project_or_role, content);
            }
            Stage::Experience => {
                delta.has_specificity = any_match(&self.specificity, content);
            }
            Stage::Advice => {
                delta.asked_advice = any_match(&self.advice_request, content)
                    || content.contains('?')
                    || content.contains('？');
            }
            Stage::WrapUp => {
                delta.has_thanks_followup = any_match(&self.wrap_up, content);
            }
            Stage::Done => {}
        }

        delta
    }
}
