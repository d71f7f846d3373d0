//! End-to-end adaptive-truncation scenario: a fake embedding backend that
//! only accepts inputs at or under a length cutoff, driving the client's
//! retry loop through two truncation steps before it succeeds.

use std::sync::{Arc, Mutex};

use neuron_embed::client::{embed_with_retry, EmbedConfig};
use neuron_embed::{EmbedError, TruncationStrategy};

#[tokio::test]
async fn adaptive_truncation_converges_after_two_steps() {
    let config = EmbedConfig {
        truncation_step_chars: 1000,
        truncation_strategy: TruncationStrategy::Head,
        max_retries: 5,
        ..EmbedConfig::default()
    };

    let original = "x".repeat(5000);
    let seen_lengths: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = seen_lengths.clone();

    let result = embed_with_retry(&original, &config, move |text| {
        let len = text.chars().count();
        seen.lock().unwrap().push(len);
        async move {
            if len > 3000 {
                Err(EmbedError::Length(format!("input too long: {len} chars")))
            } else {
                Ok(vec![0.1; 8])
            }
        }
    })
    .await;

    assert!(result.is_ok(), "expected the truncated call to eventually succeed");

    let lengths = seen_lengths.lock().unwrap().clone();
    // originalLength=5000, two truncation steps of 1000 chars each land
    // on 4000 (still too long) then 3000 (accepted) — three calls total.
    assert_eq!(lengths, vec![5000, 4000, 3000]);
    assert_eq!(lengths.first().copied(), Some(5000));
    assert_eq!(lengths.last().copied(), Some(3000));
}

#[tokio::test]
async fn a_text_right_at_the_cutoff_never_truncates() {
    let config = EmbedConfig {
        truncation_step_chars: 1000,
        max_retries: 3,
        ..EmbedConfig::default()
    };
    let text = "y".repeat(3000);
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();

    let result = embed_with_retry(&text, &config, move |t| {
        seen2.lock().unwrap().push(t.chars().count());
        async move { Ok(vec![0.2; 8]) }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(seen.lock().unwrap().as_slice(), &[3000]);
}
