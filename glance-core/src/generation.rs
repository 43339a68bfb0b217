use anyhow::Result;

/// `[DEC]`, the token BLIP's text decoder starts every caption with.
pub const BLIP_BOS_TOKEN_ID: u32 = 30522;
/// `[SEP]`, emitted by the decoder when the caption is finished.
pub const BLIP_EOS_TOKEN_ID: u32 = 102;
/// Sequence cap used when the caller does not configure one.
pub const DEFAULT_MAX_LENGTH: usize = 20;
/// Longest sequence BLIP's text decoder has position embeddings for.
pub const MAX_LENGTH_LIMIT: usize = 512;

/// A single autoregressive decoding step.
pub trait TokenStep {
    /// Returns the token following `tokens`.
    ///
    /// `tokens[..start]` has already been fed to the decoder on earlier steps,
    /// so a kv-cached implementation only needs `tokens[start..]`.
    fn next_token(&mut self, tokens: &[u32], start: usize) -> Result<u32>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationParams {
    pub bos_token_id: u32,
    pub eos_token_id: u32,
    /// Upper bound on the whole sequence, the leading BOS token included.
    pub max_length: usize,
}

impl GenerationParams {
    pub fn blip(max_length: Option<usize>) -> Self {
        Self {
            bos_token_id: BLIP_BOS_TOKEN_ID,
            eos_token_id: BLIP_EOS_TOKEN_ID,
            max_length: max_length.unwrap_or(DEFAULT_MAX_LENGTH),
        }
    }
}

/// Runs the decoding loop until EOS or the length cap.
///
/// The returned sequence starts with BOS and never contains EOS.
pub fn generate<S: TokenStep + ?Sized>(step: &mut S, params: GenerationParams) -> Result<Vec<u32>> {
    let mut tokens = vec![params.bos_token_id];
    let mut start = 0;
    while tokens.len() < params.max_length {
        let token = step.next_token(&tokens, start)?;
        if token == params.eos_token_id {
            break;
        }
        start = tokens.len();
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed script and records what it was shown.
    struct Scripted {
        script: Vec<u32>,
        seen: Vec<(usize, usize)>,
    }

    impl Scripted {
        fn new(script: &[u32]) -> Self {
            Self {
                script: script.to_vec(),
                seen: Vec::new(),
            }
        }
    }

    impl TokenStep for Scripted {
        fn next_token(&mut self, tokens: &[u32], start: usize) -> Result<u32> {
            self.seen.push((tokens.len(), start));
            // Past the end of the script the decoder keeps repeating itself.
            Ok(*self.script.get(tokens.len() - 1).unwrap_or(&7))
        }
    }

    struct Failing;

    impl TokenStep for Failing {
        fn next_token(&mut self, _tokens: &[u32], _start: usize) -> Result<u32> {
            anyhow::bail!("decoder blew up")
        }
    }

    #[test]
    fn stops_at_eos_without_emitting_it() {
        let mut step = Scripted::new(&[5, 6, BLIP_EOS_TOKEN_ID, 9]);
        let tokens = generate(&mut step, GenerationParams::blip(Some(50))).unwrap();
        assert_eq!(tokens, vec![BLIP_BOS_TOKEN_ID, 5, 6]);
    }

    #[test]
    fn length_cap_includes_bos() {
        let mut step = Scripted::new(&[]);
        let tokens = generate(&mut step, GenerationParams::blip(Some(50))).unwrap();
        assert_eq!(tokens.len(), 50);
        assert_eq!(tokens[0], BLIP_BOS_TOKEN_ID);
    }

    #[test]
    fn default_cap_applies_without_max_length() {
        let mut step = Scripted::new(&[]);
        let tokens = generate(&mut step, GenerationParams::blip(None)).unwrap();
        assert_eq!(tokens.len(), DEFAULT_MAX_LENGTH);
    }

    #[test]
    fn tiny_caps_generate_nothing() {
        for max_length in [0, 1] {
            let mut step = Scripted::new(&[]);
            let tokens = generate(&mut step, GenerationParams::blip(Some(max_length))).unwrap();
            assert_eq!(tokens, vec![BLIP_BOS_TOKEN_ID]);
            assert!(step.seen.is_empty());
        }
    }

    #[test]
    fn only_unseen_tokens_are_marked_new() {
        let mut step = Scripted::new(&[11, 12, BLIP_EOS_TOKEN_ID]);
        generate(&mut step, GenerationParams::blip(None)).unwrap();
        assert_eq!(step.seen, vec![(1, 0), (2, 1), (3, 2)]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let script = [3, 1, 4, 1, 5, 9, 2, 6];
        let first = generate(&mut Scripted::new(&script), GenerationParams::blip(Some(6))).unwrap();
        let second = generate(&mut Scripted::new(&script), GenerationParams::blip(Some(6))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn step_errors_propagate() {
        let err = generate(&mut Failing, GenerationParams::blip(None)).unwrap_err();
        assert!(err.to_string().contains("blew up"));
    }
}
