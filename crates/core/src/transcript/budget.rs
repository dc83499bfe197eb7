use super::Transcript;
use crate::token::TokenCounter;

/// The prompt ceiling used when none is configured.
pub const DEFAULT_MAX_PROMPT_TOKENS: usize = 2500;

/// Evicts the oldest non-system messages until the transcript fits in
/// `max_tokens`, returning the resulting prompt size.
///
/// The system message and the most recent message are always kept, so the
/// result may still exceed the budget when those two alone are too large.
pub fn shrink(
    transcript: &mut Transcript,
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> usize {
    let mut tokens = counter.count(&transcript.joined_content());
    let mut evicted = 0;
    while tokens > max_tokens && transcript.len() > 2 {
        let message = transcript.remove_oldest();
        trace!("evicted a {:?} message", message.role());
        evicted += 1;
        tokens = counter.count(&transcript.joined_content());
    }
    if evicted > 0 {
        debug!("evicted {evicted} message(s), prompt is now {tokens} tokens");
    }
    tokens
}

#[cfg(test)]
mod tests {
    use scenechat_model::ModelMessage;

    use super::*;
    use crate::token::HeuristicTokenCounter;

    fn transcript_of(contents: &[&str]) -> Transcript {
        let mut transcript = Transcript::new(contents[0]);
        for (idx, content) in contents.iter().enumerate().skip(1) {
            let content = (*content).to_owned();
            transcript.push(if idx % 2 == 1 {
                ModelMessage::User(content)
            } else {
                ModelMessage::Assistant(content)
            });
        }
        transcript
    }

    #[test]
    fn test_under_budget_is_untouched() {
        let counter = HeuristicTokenCounter::new(1);
        let mut transcript = transcript_of(&["sys", "hello", "world"]);
        let expected = transcript.clone();

        assert_eq!(shrink(&mut transcript, 100, &counter), 13);
        assert_eq!(transcript, expected);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let counter = HeuristicTokenCounter::new(1);
        let mut transcript =
            transcript_of(&["sys", "aaaa", "bbbb", "cccc", "dddd", "eeee"]);

        let tokens = shrink(&mut transcript, 11, &counter);
        assert_eq!(tokens, 11);
        assert_eq!(transcript, {
            let mut t = Transcript::new("sys");
            t.push(ModelMessage::Assistant("dddd".to_owned()));
            t.push(ModelMessage::User("eeee".to_owned()));
            t
        });

        // Shrinking again changes nothing.
        let expected = transcript.clone();
        assert_eq!(shrink(&mut transcript, 11, &counter), 11);
        assert_eq!(transcript, expected);
    }

    #[test]
    fn test_keeps_system_and_latest_message() {
        let counter = HeuristicTokenCounter::new(1);
        let mut transcript =
            transcript_of(&["system prompt", "old", "older reply", "latest"]);

        let tokens = shrink(&mut transcript, 1, &counter);
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.messages()[0],
            ModelMessage::System("system prompt".to_owned())
        );
        assert_eq!(
            transcript.messages()[1],
            ModelMessage::User("latest".to_owned())
        );
        assert_eq!(tokens, 19);
    }
}
