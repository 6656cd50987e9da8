use super::*;
use anyhow::Result;
use tempfile::tempdir;

const VOCAB: &str = "<SP>\n<BR>\nこん\nこ\nん\nに\nちは\nち\nは\n<|emoji1|>\na,A\n,\n<|byte227|>\n<|byte129|>\n<|byte130|>";
const SYMBOLS: &str = r#"{"emoji": {"😀": "<|emoji1|>"}, "emoji_inv": {"<|emoji1|>": "😀"}}"#;

pub(crate) const HF_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {"[UNK]": 0, "hello": 1, "world": 2},
        "unk_token": "[UNK]"
    }
}"#;

fn symbol_tokenizer() -> SymbolVocabTokenizer {
    SymbolVocabTokenizer::from_strs(VOCAB, SYMBOLS).unwrap()
}

#[test]
fn test_prefers_lowest_id_among_matches() -> Result<()> {
    let tok = symbol_tokenizer();
    // "こん" (id 2) beats "こ" (id 3); "ちは" (id 6) beats "ち" (id 7).
    assert_eq!(tok.encode("こんにちは")?, vec![2, 5, 6]);
    Ok(())
}

#[test]
fn test_whitespace_and_symbols_become_placeholders() -> Result<()> {
    let tok = symbol_tokenizer();
    assert_eq!(tok.encode("こ ん\n😀")?, vec![3, 0, 4, 1, 9]);
    Ok(())
}

#[test]
fn test_alternate_spellings_share_an_id() -> Result<()> {
    let tok = symbol_tokenizer();
    assert_eq!(tok.encode("aA")?, vec![10, 10]);
    assert_eq!(tok.encode(",")?, vec![11]);
    assert_eq!(tok.decode(&[10])?, "a");
    Ok(())
}

#[test]
fn test_byte_fallback_round_trips() -> Result<()> {
    let tok = symbol_tokenizer();
    // U+3042 "あ" is not in the vocabulary: E3 81 82.
    let ids = tok.encode("あ")?;
    assert_eq!(ids, vec![12, 13, 14]);
    assert_eq!(tok.decode(&ids)?, "あ");
    Ok(())
}

#[test]
fn test_unencodable_character_is_an_error() {
    let tok = symbol_tokenizer();
    assert!(tok.encode("x").is_err());
}

#[test]
fn test_decode_restores_placeholders() -> Result<()> {
    let tok = symbol_tokenizer();
    assert_eq!(tok.decode(&[2, 0, 9, 1])?, "こん 😀\n");
    assert!(tok.decode(&[999]).is_err());
    Ok(())
}

#[test]
fn test_longer_symbols_substituted_first() -> Result<()> {
    let tok = SymbolVocabTokenizer::from_strs(
        "<SP>\n<|emoji1|>\n<|emoji2|>\n<KIGOU>",
        r#"{"emoji": {"👍": "<|emoji1|>", "👍🏻": "<|emoji2|>"}}"#,
    )?;
    assert_eq!(tok.encode("👍🏻👍")?, vec![2, 1]);

    // Decode-only placeholder: the text it restores is never mapped back.
    assert_eq!(tok.decode(&[3])?, "ǀ");
    assert!(tok.encode("ǀ").is_err());
    Ok(())
}

#[test]
fn test_symbol_inverse_derived_when_absent() -> Result<()> {
    let tok = SymbolVocabTokenizer::from_strs(VOCAB, r#"{"emoji": {"😀": "<|emoji1|>"}}"#)?;
    assert_eq!(tok.decode(&[9])?, "😀");
    Ok(())
}

#[test]
fn test_hf_tokenizer_skips_special_tokens_on_encode() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join(HF_TOKENIZER_FILE);
    std::fs::write(&path, HF_JSON)?;

    let tok = HfTokenizer::from_file(&path)?;
    assert_eq!(tok.encode("hello world")?, vec![1, 2]);
    assert_eq!(tok.decode(&[2])?, "world");
    assert_eq!(tok.kind(), TokenizerKind::HuggingFace);
    Ok(())
}

#[test]
fn test_load_tokenizer_resolution_order() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join(DEFAULT_VOCAB_FILE), VOCAB)?;
    std::fs::write(dir.path().join(DEFAULT_SYMBOL_FILE), SYMBOLS)?;

    let tok = load_tokenizer(dir.path(), &TokenizerFiles::default())?;
    assert_eq!(tok.kind(), TokenizerKind::SymbolVocab);

    std::fs::write(dir.path().join(HF_TOKENIZER_FILE), HF_JSON)?;
    let tok = load_tokenizer(dir.path(), &TokenizerFiles::default())?;
    assert_eq!(tok.kind(), TokenizerKind::HuggingFace);

    let explicit = TokenizerFiles {
        vocab: Some(dir.path().join(DEFAULT_VOCAB_FILE)),
        symbols: Some(dir.path().join(DEFAULT_SYMBOL_FILE)),
    };
    let tok = load_tokenizer(dir.path(), &explicit)?;
    assert_eq!(tok.kind(), TokenizerKind::SymbolVocab);
    Ok(())
}

#[test]
fn test_load_tokenizer_missing_files() {
    let dir = tempdir().unwrap();
    assert!(load_tokenizer(dir.path(), &TokenizerFiles::default()).is_err());

    let half = TokenizerFiles {
        vocab: Some(dir.path().join("vocab.txt")),
        symbols: None,
    };
    assert!(load_tokenizer(dir.path(), &half).is_err());
}
