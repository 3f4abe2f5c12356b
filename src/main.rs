use std::{env, error::Error, process::ExitCode};

use mp3stream::StreamConfig;
use tracing::{error, info};

#[cfg(feature = "mp3enc")]
const FRAMES_PER_BLOCK: usize = 4096;

#[cfg(feature = "mp3enc")]
mod raw {
    use std::io::{self, Read};

    use mp3stream::InputSample;

    /// * A sample that can be read from little-endian raw PCM.
    pub trait RawSample: InputSample {
        const SIZE: usize;
        fn from_le(bytes: &[u8]) -> Self;
    }

    macro_rules! impl_raw_sample {
        ($type:ty) => {
            impl RawSample for $type {
                const SIZE: usize = size_of::<$type>();
                fn from_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; size_of::<$type>()];
                    buf.copy_from_slice(&bytes[..size_of::<$type>()]);
                    <$type>::from_le_bytes(buf)
                }
            }
        };
    }

    impl_raw_sample!(i16);
    impl_raw_sample!(i32);
    impl_raw_sample!(f32);
    impl_raw_sample!(f64);

    /// * Reads until `buffer` is full or the input ends, returns how many bytes were read.
    pub fn fill_block(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0usize;
        while filled < buffer.len() {
            match reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

#[cfg(feature = "mp3enc")]
fn encode_file<S>(config: StreamConfig, input_file: &str, output_file: &str, level: Option<f64>) -> Result<(), Box<dyn Error>>
where
    S: raw::RawSample,
{
    use std::{fs::File, io::BufWriter};

    use mp3stream::{LameBackend, Mp3Writer, SeekableSink};
    use raw::fill_block;

    let mut reader = File::open(input_file)?;
    let sink = SeekableSink::new(BufWriter::new(File::create(output_file)?));
    let mut writer = Mp3Writer::new(sink, config, LameBackend::new())?;
    if let Some(level) = level {
        if !writer.set_compression_level(level) {
            return Err(format!("Bad compression level: {level}").into());
        }
    }

    let mut block = vec![0u8; FRAMES_PER_BLOCK * config.channels as usize * S::SIZE];
    let mut samples = Vec::<S>::with_capacity(FRAMES_PER_BLOCK * config.channels as usize);
    loop {
        let size = fill_block(&mut reader, &mut block)?;
        if size == 0 {
            break;
        }
        samples.clear();
        samples.extend(block[..size].chunks_exact(S::SIZE).map(S::from_le));
        let written = writer.write_samples(&samples)?;
        if let Some(err) = writer.last_error() {
            return Err(format!("Encoding stopped after {written} of {} samples: {err}", samples.len()).into());
        }
    }

    let report = writer.close()?;
    info!(
        frames = writer.frames_written(),
        flushed_bytes = report.flushed_bytes,
        trailer_bytes = report.trailer_bytes,
        header_patched = report.header_patched,
        "Finished {output_file}."
    );
    Ok(())
}

#[cfg(not(feature = "mp3enc"))]
fn encode_file<S>(_config: StreamConfig, _input_file: &str, _output_file: &str, _level: Option<f64>) -> Result<(), Box<dyn Error>>
where
    S: mp3stream::InputSample,
{
    Err("Built without the `mp3enc` feature, there's no encoder to use.".into())
}

fn usage() {
    println!("Usage: mp3stream <s16|s32|f32|f64> <channels> <sample rate> <input.raw> <output.mp3> [compression level]");
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let channels = args[2].parse::<u16>()?;
    let sample_rate = args[3].parse::<u32>()?;
    let input_file = &args[4];
    let output_file = &args[5];
    let level = match args.get(6) {
        Some(level) => Some(level.parse::<f64>()?),
        None => None,
    };
    let config = StreamConfig::new(channels, sample_rate);
    info!(format = %args[1], channels, sample_rate, "Encoding {input_file} to {output_file}.");
    match args[1].as_str() {
        "s16" => encode_file::<i16>(config, input_file, output_file, level),
        "s32" => encode_file::<i32>(config, input_file, output_file, level),
        "f32" => encode_file::<f32>(config, input_file, output_file, level),
        "f64" => encode_file::<f64>(config, input_file, output_file, level),
        other => Err(format!("Unknown sample format \"{other}\"").into()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 6 {
        usage();
        return ExitCode::from(1);
    }
    match run(&args) {
        Ok(_) => ExitCode::from(0),
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}
