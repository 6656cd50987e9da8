//! Reducing score records into sums or annotated text.

use anyhow::Result;

use crate::config::OutputMode;
use crate::engine::ScoreRecord;
use crate::special::SpecialTokens;
use crate::tokenizer::ModelTokenizer;

/// Joins the rendered segments of one context.
pub const SEGMENT_BANNER: &str = "=================\n";

/// What one context reduces to.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextScore {
    Value(f32),
    Text(String),
}

pub struct OutputFormatter<'a> {
    mode: OutputMode,
    tokenizer: &'a dyn ModelTokenizer,
    special: SpecialTokens,
}

impl<'a> OutputFormatter<'a> {
    pub fn new(mode: OutputMode, tokenizer: &'a dyn ModelTokenizer, special: SpecialTokens) -> Self {
        Self {
            mode,
            tokenizer,
            special,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn reduce(&self, records: &[ScoreRecord]) -> Result<ContextScore> {
        match self.mode {
            OutputMode::ValueOnly => Ok(ContextScore::Value(context_sum(records))),
            OutputMode::MaxAnnotated | OutputMode::PlainAnnotated => {
                let blocks = records
                    .iter()
                    .map(|r| self.render_segment(r))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ContextScore::Text(blocks.join(SEGMENT_BANNER)))
            }
        }
    }

    fn render_segment(&self, record: &ScoreRecord) -> Result<String> {
        let rows = record
            .tokens
            .iter()
            .map(|t| -> Result<String> {
                let actual = self.token_text(t.actual)?;
                Ok(match self.mode {
                    OutputMode::MaxAnnotated => format!(
                        "{}\t{}\t{}",
                        format_score(t.score),
                        actual,
                        self.token_text(t.predicted)?
                    ),
                    _ => format!("{}\t{}", format_score(t.score), actual),
                })
            })
            .collect::<Result<Vec<String>>>()?;
        Ok(rows.join("\n"))
    }

    /// Content ids go through the tokenizer; sentinels render by name.
    fn token_text(&self, id: u32) -> Result<String> {
        let s = &self.special;
        let name = match id {
            _ if id == s.eot => "<|endoftext|>",
            _ if id == s.mask => "[MASK]",
            _ if id == s.cls => "[CLS]",
            _ if id == s.sep => "[SEP]",
            _ => return self.tokenizer.decode(&[id]),
        };
        Ok(name.to_string())
    }
}

pub fn context_sum(records: &[ScoreRecord]) -> f32 {
    records.iter().map(ScoreRecord::sum).sum()
}

/// Shortest round-trip form, keeping `.0` on integral values.
pub fn format_score(score: f32) -> String {
    format!("{:?}", score)
}

/// Running sum over the context totals of a value-only run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrandTotal(f32);

impl GrandTotal {
    pub fn add(&mut self, value: f32) -> f32 {
        self.0 += value;
        self.0
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}
