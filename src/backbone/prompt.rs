//! Prompt layout and speech-token parsing for the VieNeu/NeuTTS vocabulary.
//!
//! ```text
//! user: Convert the text to speech:<|TEXT_PROMPT_START|>{ref_text} {text}<|TEXT_PROMPT_END|>
//! assistant:<|SPEECH_GENERATION_START|><|speech_c0|><|speech_c1|>...
//! ```
//!
//! The model continues the speech tokens of the reference with speech tokens
//! for the target text and closes with `<|SPEECH_GENERATION_END|>`.

use anyhow::Result;

pub const TEXT_REPLACE: &str = "<|TEXT_REPLACE|>";
pub const SPEECH_REPLACE: &str = "<|SPEECH_REPLACE|>";
pub const TEXT_PROMPT_START: &str = "<|TEXT_PROMPT_START|>";
pub const TEXT_PROMPT_END: &str = "<|TEXT_PROMPT_END|>";
pub const SPEECH_GENERATION_START: &str = "<|SPEECH_GENERATION_START|>";
pub const SPEECH_GENERATION_END: &str = "<|SPEECH_GENERATION_END|>";

pub const CHAT_TEMPLATE: &str =
    "user: Convert the text to speech:<|TEXT_REPLACE|>\nassistant:<|SPEECH_REPLACE|>";

const SPEECH_PREFIX: &str = "<|speech_";
const SPEECH_SUFFIX: &str = "|>";

/// The vocabulary operations prompt assembly needs.
pub trait PromptVocab {
    /// Tokenize without adding special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Id of a single token; errors if the vocabulary lacks it.
    fn token_id(&self, token: &str) -> Result<u32>;

    /// Text of a single token id.
    fn token_text(&self, id: u32) -> Option<String>;
}

impl PromptVocab for tokenizers::Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = (**self).encode(text, false).map_err(anyhow::Error::msg)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn token_id(&self, token: &str) -> Result<u32> {
        self.token_to_id(token)
            .ok_or_else(|| anyhow::anyhow!("Tokenizer has no token {token}"))
    }

    fn token_text(&self, id: u32) -> Option<String> {
        self.id_to_token(id)
    }
}

/// `<|speech_N|>` for codec code `N`.
pub fn speech_token(code: u32) -> String {
    format!("{SPEECH_PREFIX}{code}{SPEECH_SUFFIX}")
}

/// Codec code named by a `<|speech_N|>` token.
pub fn parse_speech_token(token: &str) -> Option<u32> {
    token
        .strip_prefix(SPEECH_PREFIX)?
        .strip_suffix(SPEECH_SUFFIX)?
        .parse()
        .ok()
}

/// Assemble the prompt ids for one synthesis call.
pub fn build_prompt<V: PromptVocab + ?Sized>(
    vocab: &V,
    ref_codes: &[u32],
    ref_text: &str,
    text: &str,
) -> Result<Vec<u32>> {
    let text_replace = vocab.token_id(TEXT_REPLACE)?;
    let speech_replace = vocab.token_id(SPEECH_REPLACE)?;
    let text_start = vocab.token_id(TEXT_PROMPT_START)?;
    let text_end = vocab.token_id(TEXT_PROMPT_END)?;
    let generation_start = vocab.token_id(SPEECH_GENERATION_START)?;

    let template = vocab.encode(CHAT_TEMPLATE)?;
    let text_at = template
        .iter()
        .position(|&id| id == text_replace)
        .ok_or_else(|| anyhow::anyhow!("{TEXT_REPLACE} missing from tokenized template"))?;
    let speech_at = template
        .iter()
        .position(|&id| id == speech_replace)
        .filter(|&at| at > text_at)
        .ok_or_else(|| anyhow::anyhow!("{SPEECH_REPLACE} missing from tokenized template"))?;

    let text_ids = vocab.encode(&format!("{ref_text} {text}"))?;
    let codes = ref_codes.iter().map(|&code| speech_token(code)).collect::<String>();
    let code_ids = vocab.encode(&codes)?;

    let mut ids = Vec::with_capacity(template.len() + text_ids.len() + code_ids.len() + 3);
    ids.extend_from_slice(&template[..text_at]);
    ids.push(text_start);
    ids.extend_from_slice(&text_ids);
    ids.push(text_end);
    ids.extend_from_slice(&template[text_at + 1..speech_at]);
    ids.push(generation_start);
    ids.extend_from_slice(&code_ids);
    Ok(ids)
}

/// Codec codes of the generated ids; anything that is not a speech token is skipped.
pub fn extract_speech_codes<V: PromptVocab + ?Sized>(vocab: &V, ids: &[u32]) -> Vec<u32> {
    ids.iter()
        .filter_map(|&id| vocab.token_text(id))
        .filter_map(|token| parse_speech_token(&token))
        .collect()
}
