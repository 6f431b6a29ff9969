use std::path::Path;

use crate::media::domain::audio_extractor::AudioExtractor;
use crate::media::domain::audio_reader::AudioReader;
use crate::media::domain::audio_segment::AudioSegment;
use crate::media::domain::media_error::MediaError;
use crate::media::infrastructure::ffmpeg_audio_reader::FfmpegAudioReader;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const PCM_CHUNK_SAMPLES: usize = 1024;

/// Extracts the audio of a media file into a 16-bit PCM WAV.
///
/// Decoding and resampling go through [`FfmpegAudioReader`]; the result is
/// re-encoded with the `pcm_s16le` encoder into a WAV container.
pub struct FfmpegAudioExtractor;

impl AudioExtractor for FfmpegAudioExtractor {
    fn extract_audio(
        &self,
        media_path: &Path,
        sample_rate: u32,
        output_path: &Path,
    ) -> Result<(), BoxError> {
        let audio = FfmpegAudioReader.read_audio(media_path, sample_rate)?;
        if audio.is_empty() {
            return Err(MediaError::terminal(media_path, "audio track is empty").into());
        }

        write_wav(output_path, &audio)
            .map_err(|e| MediaError::terminal(media_path, format!("WAV encode failed: {e}")).into())
    }
}

fn write_wav(path: &Path, audio: &AudioSegment) -> Result<(), BoxError> {
    ffmpeg_next::init()?;

    let mut octx = ffmpeg_next::format::output(path)?;

    let pcm_codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::PCM_S16LE)
        .ok_or("PCM encoder not found")?;
    let mut ost = octx.add_stream(Some(pcm_codec))?;
    let stream_idx = ost.index();

    let mut encoder = ffmpeg_next::codec::context::Context::new_with_codec(pcm_codec)
        .encoder()
        .audio()?;
    encoder.set_rate(audio.sample_rate() as i32);
    encoder.set_channel_layout(ffmpeg_next::ChannelLayout::MONO);
    encoder.set_format(ffmpeg_next::format::Sample::I16(
        ffmpeg_next::format::sample::Type::Packed,
    ));
    encoder.set_time_base((1, audio.sample_rate() as i32));

    let mut encoder = encoder.open_as(pcm_codec)?;
    ost.set_parameters(&encoder);
    let enc_time_base = encoder.time_base();

    octx.write_header()?;
    let ost_time_base = octx
        .stream(stream_idx)
        .ok_or("output stream vanished")?
        .time_base();

    let mut pts: i64 = 0;
    for chunk in audio.samples().chunks(PCM_CHUNK_SAMPLES) {
        let mut frame = ffmpeg_next::util::frame::audio::Audio::new(
            ffmpeg_next::format::Sample::I16(ffmpeg_next::format::sample::Type::Packed),
            chunk.len(),
            ffmpeg_next::ChannelLayout::MONO,
        );
        frame.set_rate(audio.sample_rate());
        frame.set_pts(Some(pts));

        let dst = frame.data_mut(0);
        for (i, sample) in chunk.iter().enumerate() {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            dst[i * 2..i * 2 + 2].copy_from_slice(&pcm.to_ne_bytes());
        }

        encoder.send_frame(&frame)?;
        drain_packets(&mut encoder, &mut octx, stream_idx, enc_time_base, ost_time_base)?;
        pts += chunk.len() as i64;
    }

    encoder.send_eof()?;
    drain_packets(&mut encoder, &mut octx, stream_idx, enc_time_base, ost_time_base)?;

    octx.write_trailer()?;
    Ok(())
}

fn drain_packets(
    encoder: &mut ffmpeg_next::codec::encoder::audio::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    stream_idx: usize,
    enc_time_base: ffmpeg_next::Rational,
    ost_time_base: ffmpeg_next::Rational,
) -> Result<(), BoxError> {
    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(stream_idx);
        encoded.rescale_ts(enc_time_base, ost_time_base);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}
