//! Greedy subword tokenizer driven by a plain vocabulary list and a
//! symbol (emoji) placeholder table.
//!
//! Vocabulary file: one entry per line, the line number is the id. A line
//! with commas lists alternate spellings of the same id; the first one is
//! used when decoding. A lone `,` is the comma token itself.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::{ModelTokenizer, TokenizerKind};

/// Candidate width when the scan position is not a `<` placeholder start.
const SHORT_CANDIDATE_CHARS: usize = 3;

const WHITESPACE_RULES: &[(&str, &str)] = &[
    (" ", "<SP>"),
    ("\u{3000}", "<SP>"),
    ("\r\n", "<BR>"),
    ("\n", "<BR>"),
    ("\r", "<BR>"),
    ("\t", "<TAB>"),
    ("—", "ー"),
    ("−", "ー"),
];

/// Placeholder spellings restored on decode. `<BLOCK>`, `<KIGOU>` and
/// `<U2000U2BFF>` are never produced by `encode`.
const PLACEHOLDER_TEXT: &[(&str, &str)] = &[
    ("<SP>", " "),
    ("<BR>", "\n"),
    ("<TAB>", "\t"),
    ("<BLOCK>", "▀"),
    ("<KIGOU>", "ǀ"),
    ("<U2000U2BFF>", "‖"),
];

#[derive(Debug, Deserialize)]
struct SymbolTable {
    emoji: HashMap<String, String>,
    #[serde(default)]
    emoji_inv: Option<HashMap<String, String>>,
}

pub struct SymbolVocabTokenizer {
    /// spelling -> id
    swap: HashMap<String, u32>,
    /// id -> decoding spelling
    spellings: Vec<String>,
    /// symbol -> placeholder, longest symbol first
    symbols: Vec<(String, String)>,
    /// placeholder -> symbol
    symbols_inv: HashMap<String, String>,
    /// longest spelling, in chars
    max_len: usize,
}

impl SymbolVocabTokenizer {
    pub fn from_files(vocab_path: &Path, symbols_path: &Path) -> Result<Self> {
        let vocab = std::fs::read_to_string(vocab_path)
            .with_context(|| format!("failed to read vocabulary {:?}", vocab_path))?;
        let symbols = std::fs::read_to_string(symbols_path)
            .with_context(|| format!("failed to read symbol table {:?}", symbols_path))?;
        let tokenizer = Self::from_strs(&vocab, &symbols)
            .with_context(|| format!("in {:?} / {:?}", vocab_path, symbols_path))?;
        log::info!(
            "loaded vocabulary: {} ids, {} symbols",
            tokenizer.spellings.len(),
            tokenizer.symbols.len()
        );
        Ok(tokenizer)
    }

    pub fn from_strs(vocab: &str, symbols_json: &str) -> Result<Self> {
        let mut swap = HashMap::new();
        let mut spellings = Vec::new();

        for (id, line) in vocab.lines().enumerate() {
            let id = u32::try_from(id)?;
            let variants: Vec<&str> = if line == "," || !line.contains(',') {
                vec![line]
            } else {
                line.split(',').collect()
            };
            for variant in &variants {
                swap.insert(variant.to_string(), id);
            }
            spellings.push(variants[0].to_string());
        }
        if spellings.is_empty() {
            return Err(anyhow!("vocabulary is empty"));
        }

        let table: SymbolTable =
            serde_json::from_str(symbols_json).context("malformed symbol table")?;
        let symbols_inv = match table.emoji_inv {
            Some(inv) => inv,
            None => table
                .emoji
                .iter()
                .map(|(sym, ph)| (ph.clone(), sym.clone()))
                .collect(),
        };
        let mut symbols: Vec<(String, String)> = table.emoji.into_iter().collect();
        // Longer symbols first so multi-codepoint emoji are not split by a prefix.
        symbols.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let max_len = swap.keys().map(|w| w.chars().count()).max().unwrap_or(1);

        Ok(Self {
            swap,
            spellings,
            symbols,
            symbols_inv,
            max_len,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.spellings.len()
    }

    fn normalize(&self, text: &str) -> String {
        let mut text = text.to_string();
        for (from, to) in WHITESPACE_RULES {
            if text.contains(from) {
                text = text.replace(from, to);
            }
        }
        for (symbol, placeholder) in &self.symbols {
            if text.contains(symbol.as_str()) {
                text = text.replace(symbol.as_str(), placeholder);
            }
        }
        text
    }

    /// Best match starting at `pos`: a `<...>` placeholder wins outright,
    /// otherwise the lowest id among the matching prefixes.
    fn best_match(&self, chars: &[char], pos: usize) -> Option<(u32, usize)> {
        let width = if chars[pos] == '<' {
            self.max_len + 1
        } else {
            SHORT_CANDIDATE_CHARS
        };
        let end = (pos + width).min(chars.len());

        let mut best: Option<(u32, usize)> = None;
        for e in (pos + 1..=end).rev() {
            let word: String = chars[pos..e].iter().collect();
            if let Some(&id) = self.swap.get(&word) {
                if word.starts_with('<') && e - pos > 2 {
                    return Some((id, e));
                }
                if best.is_none_or(|(b, _)| id < b) {
                    best = Some((id, e));
                }
            }
        }
        best
    }

    fn byte_fallback(&self, ch: char, out: &mut Vec<u32>) -> Result<()> {
        let mut buf = [0u8; 4];
        for byte in ch.encode_utf8(&mut buf).bytes() {
            let token = format!("<|byte{}|>", byte);
            let id = self
                .swap
                .get(&token)
                .ok_or_else(|| anyhow!("character {:?} has no vocabulary entry or byte token", ch))?;
            out.push(*id);
        }
        Ok(())
    }

    fn placeholder_text<'a>(&'a self, word: &'a str) -> &'a str {
        if let Some(symbol) = self.symbols_inv.get(word) {
            return symbol;
        }
        PLACEHOLDER_TEXT
            .iter()
            .find(|(ph, _)| *ph == word)
            .map(|(_, text)| *text)
            .unwrap_or(word)
    }
}

fn parse_byte_token(word: &str) -> Option<u8> {
    word.strip_prefix("<|byte")?.strip_suffix("|>")?.parse().ok()
}

impl ModelTokenizer for SymbolVocabTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let chars: Vec<char> = self.normalize(text).chars().collect();
        let mut ids = Vec::with_capacity(chars.len());
        let mut pos = 0;

        while pos < chars.len() {
            match self.best_match(&chars, pos) {
                Some((id, end)) => {
                    ids.push(id);
                    pos = end;
                }
                None => {
                    self.byte_fallback(chars[pos], &mut ids)?;
                    pos += 1;
                }
            }
        }
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let mut text = String::new();
        let mut pending_bytes: Vec<u8> = Vec::new();

        for &id in ids {
            let word = self
                .spellings
                .get(id as usize)
                .ok_or_else(|| anyhow!("token id {} is outside the vocabulary", id))?;

            if let Some(byte) = parse_byte_token(word) {
                pending_bytes.push(byte);
                continue;
            }
            if !pending_bytes.is_empty() {
                text.push_str(&String::from_utf8_lossy(&pending_bytes));
                pending_bytes.clear();
            }
            text.push_str(self.placeholder_text(word));
        }
        if !pending_bytes.is_empty() {
            text.push_str(&String::from_utf8_lossy(&pending_bytes));
        }
        Ok(text)
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::SymbolVocab
    }
}
