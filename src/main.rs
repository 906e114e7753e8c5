use std::{
    fs::File,
    io::{self, Read},
    num::NonZeroU32,
    path::{Path, PathBuf},
    thread,
};

use anyhow::{anyhow, bail, Context, Result as AnyResult};
use clap::Parser;
use log::LevelFilter;
use vitals_monitor::{
    config::{AdcResolution, Config},
    link::{Link, Source, CHUNK_SIZE},
    pipeline::{Observer, Pipeline, Sample, Spo2Reading},
};

/// Replays captured sensor byte streams and reports heart rate and SpO2.
#[derive(Debug, Parser)]
#[clap(about, version)]
pub struct Cli {
    /// Capture of the serial byte stream. `-` reads standard input.
    #[clap(long)]
    serial: Option<PathBuf>,

    /// Capture of concatenated Bluetooth notification payloads. Replayed after the serial
    /// capture, taking over the pipeline.
    #[clap(long)]
    bluetooth: Option<PathBuf>,

    /// ECG ADC resolution in bits.
    #[clap(long, value_enum, default_value_t)]
    resolution: AdcResolution,

    /// Lowest heart rate reported, in bpm.
    #[clap(long, default_value_t = 60.0)]
    min_heart_rate: f64,

    /// Highest heart rate reported, in bpm.
    #[clap(long, default_value_t = 140.0)]
    max_heart_rate: f64,

    /// Estimate SpO2 on every Nth sample.
    #[clap(long, default_value_t = NonZeroU32::MIN)]
    spo2_interval: NonZeroU32,

    /// Time without a QRS complex after which the detector recalibrates.
    #[clap(long, default_value_t = 3000)]
    silence_timeout_ms: u32,

    #[clap(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

impl Cli {
    fn config(&self) -> AnyResult<Config> {
        if self.min_heart_rate > self.max_heart_rate {
            bail!(
                "Invalid heart rate band: {} > {}",
                self.min_heart_rate,
                self.max_heart_rate
            );
        }

        Ok(Config {
            resolution: self.resolution,
            heart_rate_band: self.min_heart_rate..=self.max_heart_rate,
            spo2_interval: self.spo2_interval,
            silence_timeout_ms: self.silence_timeout_ms,
            ..Config::default()
        })
    }
}

#[derive(Default)]
struct MetricLog {
    last_spo2: Option<Spo2Reading>,
}

impl Observer for MetricLog {
    fn on_sample(&mut self, sample: &Sample) {
        log::trace!(
            "ECG {:.3} mV ({}), IR {}, RED {}",
            sample.ecg_mv,
            sample.filtered,
            sample.ir,
            sample.red
        );
    }

    fn on_heart_rate(&mut self, bpm: f64) {
        log::info!("Heart rate: {bpm:.0} bpm");
    }

    fn on_spo2(&mut self, reading: Spo2Reading) {
        if self.last_spo2 == Some(reading) {
            return;
        }
        self.last_spo2 = Some(reading);

        match reading {
            Spo2Reading {
                spo2: Some(spo2),
                heart_rate,
            } => log::info!("SpO2: {spo2}%, pulse: {:.0} bpm", heart_rate.unwrap_or(0.0)),
            Spo2Reading {
                spo2: None,
                heart_rate: Some(heart_rate),
            } => log::info!("SpO2 unavailable, pulse: {heart_rate:.0} bpm"),
            _ => log::info!("SpO2 unavailable"),
        }
    }
}

fn open(path: &Path) -> AnyResult<Box<dyn Read + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin()));
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

fn replay(link: &Link, source: Source, path: &Path) -> AnyResult<()> {
    let mut input = open(path)?;
    let transport = link.transport(source);

    log::info!("Replaying {} as {source:?}", path.display());
    transport.select();

    let mut buffer = [0; CHUNK_SIZE];
    loop {
        let read = input
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }

        transport.push(&buffer[..read]);
    }

    transport.disconnected();

    Ok(())
}

fn replay_all(link: &Link, cli: &Cli) -> AnyResult<()> {
    let captures = [
        (Source::Serial, cli.serial.as_deref()),
        (Source::Bluetooth, cli.bluetooth.as_deref()),
    ];

    for (source, path) in captures {
        let Some(path) = path else {
            continue;
        };

        thread::scope(|s| s.spawn(|| replay(link, source, path)).join())
            .map_err(|_| anyhow!("{source:?} reader panicked"))??;
    }

    Ok(())
}

fn main() -> AnyResult<()> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_level(cli.log_level)
        .env()
        .init()
        .context("Failed to initialize logger")?;

    if cli.serial.is_none() && cli.bluetooth.is_none() {
        bail!("Nothing to replay, pass --serial and/or --bluetooth");
    }

    let link = Link::new();
    let mut pipeline = Pipeline::new(cli.config()?, MetricLog::default());

    let link_stats = thread::scope(|s| -> AnyResult<_> {
        let consumer = s.spawn(|| link.run(&mut pipeline));

        let replayed = replay_all(&link, &cli);
        link.shutdown();

        let stats = consumer
            .join()
            .map_err(|_| anyhow!("Pipeline thread panicked"))?;

        replayed.map(|_| stats)
    })?;

    log::info!("Link: {link_stats:?}");
    log::info!("Decoder: {:?}", pipeline.decoder_stats());
    log::info!("Pipeline: {:?}", pipeline.stats());

    Ok(())
}
