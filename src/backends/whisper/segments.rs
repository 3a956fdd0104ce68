use anyhow::{Context, Result};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperSegment, WhisperState};

use crate::opts::Opts;
use crate::transcript::Sentence;

/// Run one full Whisper pass over 16 kHz mono samples and collect its segments as sentences.
pub(super) fn transcribe_samples(
    ctx: &WhisperContext,
    opts: &Opts,
    samples: &[f32],
) -> Result<Vec<Sentence>> {
    let state = run_whisper_full(ctx, opts, samples)?;

    let mut sentences = Vec::new();
    for segment in state.as_iter() {
        sentences.push(to_sentence(segment)?);
    }
    Ok(sentences)
}

fn to_sentence(segment: WhisperSegment) -> Result<Sentence> {
    let text = segment
        .to_str()
        .context("failed to get segment text")?
        .trim()
        .to_owned();

    let start = centiseconds_to_seconds(segment.start_timestamp());
    let end = centiseconds_to_seconds(segment.end_timestamp());

    // Whisper occasionally reports an end before the start on the final segment.
    Ok(Sentence::new(text, start, end.max(start)))
}

/// Whisper timestamps are centiseconds; unknown values are negative.
pub(super) fn centiseconds_to_seconds(value: i64) -> f64 {
    if value < 0 { 0.0 } else { value as f64 / 100.0 }
}

fn build_full_params(opts: &Opts) -> FullParams<'_, '_> {
    let mut params = FullParams::new(SamplingStrategy::BeamSearch {
        beam_size: 5,
        patience: 1.0,
    });

    params.set_n_threads(opts.thread_count());
    params.set_translate(opts.enable_translate_to_english);
    params.set_language(opts.language.as_deref());
    params.set_no_context(true);
    params.set_single_segment(false);

    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params
}

fn run_whisper_full(ctx: &WhisperContext, opts: &Opts, samples: &[f32]) -> Result<WhisperState> {
    let params = build_full_params(opts);

    let mut state = ctx
        .create_state()
        .context("failed to create whisper state")?;

    state
        .full(params, samples)
        .context("failed to run whisper full()")?;

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centiseconds_convert_to_seconds() {
        assert_eq!(centiseconds_to_seconds(0), 0.0);
        assert_eq!(centiseconds_to_seconds(250), 2.5);
        assert_eq!(centiseconds_to_seconds(-1), 0.0);
    }
}
