use std::path::Path;

use crate::media::domain::audio_reader::AudioReader;
use crate::media::domain::audio_segment::AudioSegment;
use crate::media::domain::media_error::MediaError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decodes the best audio stream of any container using ffmpeg-next.
pub struct FfmpegAudioReader;

impl AudioReader for FfmpegAudioReader {
    fn read_audio(&self, path: &Path, target_sample_rate: u32) -> Result<AudioSegment, BoxError> {
        ffmpeg_next::init().map_err(|e| MediaError::terminal(path, e.to_string()))?;

        let mut ictx = ffmpeg_next::format::input(path)
            .map_err(|e| MediaError::terminal(path, format!("cannot open: {e}")))?;

        let audio_stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Audio)
            .ok_or_else(|| MediaError::unsupported(path, "no audio stream"))?;

        let audio_stream_index = audio_stream.index();
        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(audio_stream.parameters())
                .map_err(|e| MediaError::unsupported(path, e.to_string()))?;
        let mut decoder = codec_ctx
            .decoder()
            .audio()
            .map_err(|e| MediaError::unsupported(path, e.to_string()))?;

        let mut resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Planar),
            ffmpeg_next::ChannelLayout::MONO,
            target_sample_rate,
        )?;

        let mut all_samples: Vec<f32> = Vec::new();
        let mut decoded_frame = ffmpeg_next::util::frame::audio::Audio::empty();
        let mut resampled_frame = ffmpeg_next::util::frame::audio::Audio::empty();

        for (stream, packet) in ictx.packets() {
            if stream.index() != audio_stream_index {
                continue;
            }

            decoder
                .send_packet(&packet)
                .map_err(|e| MediaError::terminal(path, format!("decode failed: {e}")))?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                resampler.run(&decoded_frame, &mut resampled_frame)?;
                extract_f32_samples(&resampled_frame, &mut all_samples);
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            resampler.run(&decoded_frame, &mut resampled_frame)?;
            extract_f32_samples(&resampled_frame, &mut all_samples);
        }

        // The resampler may still hold buffered samples.
        if let Ok(Some(delay)) = resampler.flush(&mut resampled_frame) {
            if delay.output > 0 {
                extract_f32_samples(&resampled_frame, &mut all_samples);
            }
        }

        log::debug!(
            "Decoded {} samples at {target_sample_rate} Hz from {}",
            all_samples.len(),
            path.display()
        );

        Ok(AudioSegment::new(all_samples, target_sample_rate))
    }
}

/// Extract f32 samples from a planar mono resampled frame.
fn extract_f32_samples(frame: &ffmpeg_next::util::frame::audio::Audio, out: &mut Vec<f32>) {
    let num_samples = frame.samples();
    if num_samples == 0 {
        return;
    }
    let data = frame.data(0);
    let bytes = &data[..num_samples * std::mem::size_of::<f32>()];
    out.extend(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
    );
}
