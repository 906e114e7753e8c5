use cmdif::{DecoderStats, PacketDecoder, SampleTriplet};
use signal_processing::{
    buffer::FixedRingBuffer, ecg::EcgPreprocessor, heart_rate::QrsDetector,
    sampling::SamplingFrequencyExt, spo2,
};

use crate::config::Config;

/// Number of IR and RED samples SpO2 is estimated from.
pub const SPO2_WINDOW: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub ecg_mv: f64,
    pub ir: u16,
    pub red: u16,
    /// Band-limited ECG amplitude.
    pub filtered: i16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spo2Reading {
    pub spo2: Option<u8>,
    /// Heart rate from the IR pulse wave, independent of the ECG based one.
    pub heart_rate: Option<f64>,
}

/// Receives the results of the pipeline.
pub trait Observer {
    /// Called for every decoded sample.
    fn on_sample(&mut self, sample: &Sample);

    /// Called with ECG based heart rates within the configured band.
    fn on_heart_rate(&mut self, bpm: f64);

    /// Called once the SpO2 windows are full, then every `spo2_interval` samples.
    fn on_spo2(&mut self, reading: Spo2Reading);
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_sample(&mut self, sample: &Sample) {
        (**self).on_sample(sample)
    }

    fn on_heart_rate(&mut self, bpm: f64) {
        (**self).on_heart_rate(bpm)
    }

    fn on_spo2(&mut self, reading: Spo2Reading) {
        (**self).on_spo2(reading)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub samples: u64,
    pub heart_rates: u32,
    pub heart_rates_suppressed: u32,
    pub spo2_estimates: u32,
}

/// Decodes the byte stream of one sensor and derives heart rate and SpO2 from it.
pub struct Pipeline<O> {
    config: Config,
    observer: O,

    decoder: PacketDecoder,
    ecg: EcgPreprocessor,
    qrs: QrsDetector,
    ir: FixedRingBuffer<f64, SPO2_WINDOW>,
    red: FixedRingBuffer<f64, SPO2_WINDOW>,
    spo2_countdown: u32,

    stats: PipelineStats,
}

impl<O: Observer> Pipeline<O> {
    pub fn new(config: Config, observer: O) -> Self {
        let qrs = QrsDetector::with_timing(config.sampling_rate.get().sps(), config.qrs_timing());

        Self {
            config,
            observer,

            decoder: PacketDecoder::new(),
            ecg: EcgPreprocessor::new(),
            qrs,
            ir: FixedRingBuffer::new(),
            red: FixedRingBuffer::new(),
            spo2_countdown: 0,

            stats: PipelineStats::default(),
        }
    }

    pub fn feed(&mut self, byte: u8) {
        if let Some(sample) = self.decoder.feed(byte) {
            self.process(sample);
        }
    }

    pub fn feed_all(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.feed(*byte);
        }
    }

    /// Drops the partially received frame. Filter and detector state is kept.
    pub fn reset_decoder(&mut self) {
        self.decoder.reset();
    }

    pub fn process(&mut self, triplet: SampleTriplet) {
        self.stats.samples += 1;

        let filtered = self.ecg.process(i32::from(triplet.ecg));
        self.observer.on_sample(&Sample {
            ecg_mv: self.config.resolution.to_millivolts(triplet.ecg),
            ir: triplet.ir,
            red: triplet.red,
            filtered,
        });

        if let Some(bpm) = self.qrs.update(self.ecg.smoothed()) {
            if self.config.heart_rate_band.contains(&bpm) {
                self.stats.heart_rates += 1;
                self.observer.on_heart_rate(bpm);
            } else {
                log::debug!("Heart rate {bpm:.1} is implausible, not reporting");
                self.stats.heart_rates_suppressed += 1;
            }
        }

        self.ir.push(f64::from(triplet.ir));
        self.red.push(f64::from(triplet.red));
        self.update_spo2();
    }

    fn update_spo2(&mut self) {
        let (Some(ir), Some(red)) = (self.ir.to_array(), self.red.to_array()) else {
            return;
        };

        if self.spo2_countdown > 0 {
            self.spo2_countdown -= 1;
            return;
        }
        self.spo2_countdown = self.config.spo2_interval.get() - 1;

        let reading = spo2::estimate(&ir, &red)
            .map(|estimate| Spo2Reading {
                spo2: estimate.spo2,
                heart_rate: Some(estimate.heart_rate),
            })
            .unwrap_or_default();

        self.stats.spo2_estimates += 1;
        self.observer.on_spo2(reading);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_qrs_calibrated(&self) -> bool {
        self.qrs.is_calibrated()
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

#[cfg(test)]
pub(crate) mod test {
    use core::num::NonZeroU32;

    use cmdif::{encode_vitals, SampleTriplet};

    use super::*;

    #[derive(Default)]
    pub struct Recorder {
        pub samples: Vec<Sample>,
        pub heart_rates: Vec<f64>,
        pub spo2: Vec<Spo2Reading>,
    }

    impl Observer for Recorder {
        fn on_sample(&mut self, sample: &Sample) {
            self.samples.push(*sample);
        }

        fn on_heart_rate(&mut self, bpm: f64) {
            self.heart_rates.push(bpm);
        }

        fn on_spo2(&mut self, reading: Spo2Reading) {
            self.spo2.push(reading);
        }
    }

    fn feed_samples(
        pipeline: &mut Pipeline<Recorder>,
        samples: impl IntoIterator<Item = SampleTriplet>,
    ) {
        for sample in samples {
            pipeline.feed_all(&encode_vitals(sample));
        }
    }

    fn flat(count: usize) -> impl Iterator<Item = SampleTriplet> {
        (0..count).map(|_| SampleTriplet {
            ecg: 0,
            ir: 50_000,
            red: 40_000,
        })
    }

    #[test]
    fn reference_frame_reaches_observer() {
        let mut pipeline = Pipeline::new(Config::default(), Recorder::default());

        pipeline.feed_all(&[
            0x0A, 0xFA, 0x06, 0x00, 0x02, 0x64, 0x00, 0xD0, 0x07, 0xB8, 0x0B, 0x0B,
        ]);

        let recorder = pipeline.observer();
        assert_eq!(recorder.samples.len(), 1);

        let sample = recorder.samples[0];
        assert!((sample.ecg_mv - 100.0 / 262_143.0 * 1800.0).abs() < 1e-9);
        assert_eq!((sample.ir, sample.red), (2000, 3000));
        assert!(recorder.heart_rates.is_empty());
        assert!(recorder.spo2.is_empty());
    }

    #[test]
    fn spo2_waits_for_full_window() {
        let mut pipeline = Pipeline::new(Config::default(), Recorder::default());

        feed_samples(&mut pipeline, flat(SPO2_WINDOW - 1));
        assert!(pipeline.observer().spo2.is_empty());

        feed_samples(&mut pipeline, flat(2));
        assert_eq!(
            pipeline.observer().spo2,
            [Spo2Reading::default(), Spo2Reading::default()]
        );
    }

    #[test]
    fn spo2_interval_is_respected() {
        let config = Config {
            spo2_interval: NonZeroU32::new(25).unwrap(),
            ..Config::default()
        };
        let mut pipeline = Pipeline::new(config, Recorder::default());

        #[rustfmt::skip]
        let table = [
            // samples fed, total SpO2 readings
            (SPO2_WINDOW, 1),
            (24, 1),
            (1, 2),
            (50, 4),
        ];

        for (count, expected) in table {
            feed_samples(&mut pipeline, flat(count));
            assert_eq!(pipeline.observer().spo2.len(), expected);
        }
    }

    #[test]
    fn pulse_wave_yields_spo2() {
        let mut pipeline = Pipeline::new(Config::default(), Recorder::default());

        let wave = |dc: f64, amplitude: f64, i: usize| {
            let phase = 2.0 * core::f64::consts::PI * i as f64 / 25.0;
            (dc + amplitude * phase.sin()).round() as u16
        };

        feed_samples(
            &mut pipeline,
            (0..SPO2_WINDOW).map(|i| SampleTriplet {
                ecg: 0,
                ir: wave(50_000.0, 200.0, i),
                red: wave(40_000.0, 100.0, i),
            }),
        );

        let readings = &pipeline.observer().spo2;
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].spo2, Some(96));
        let heart_rate = readings[0].heart_rate.expect("No pulse wave heart rate");
        assert!((heart_rate - 20.0).abs() < 1e-9);
    }

    /// A two second lead-in with a single spike to calibrate on, then a spike every `period`
    /// samples.
    fn ecg_spikes(period: usize, count: usize) -> impl Iterator<Item = SampleTriplet> {
        let lead_in = (0..250).map(|k| k == 0);
        let spikes = (0..count).map(move |k| k % period == 0);

        lead_in.chain(spikes).map(|spike| SampleTriplet {
            ecg: if spike { 3200 } else { 0 },
            ir: 50_000,
            red: 40_000,
        })
    }

    #[test]
    fn ecg_heart_rate_is_reported() {
        let mut pipeline = Pipeline::new(Config::default(), Recorder::default());

        feed_samples(&mut pipeline, ecg_spikes(100, 400));

        assert!(pipeline.is_qrs_calibrated());
        assert_eq!(pipeline.observer().heart_rates, [75.0]);
        assert_eq!(pipeline.stats().heart_rates, 1);
    }

    #[test]
    fn implausible_heart_rate_is_suppressed() {
        let config = Config {
            heart_rate_band: 80.0..=140.0,
            ..Config::default()
        };
        let mut pipeline = Pipeline::new(config, Recorder::default());

        feed_samples(&mut pipeline, ecg_spikes(100, 400));

        assert!(pipeline.observer().heart_rates.is_empty());
        assert_eq!(pipeline.stats().heart_rates_suppressed, 1);
    }

    #[test]
    fn partial_frame_is_dropped_on_reset() {
        let mut pipeline = Pipeline::new(Config::default(), Recorder::default());
        let frame = encode_vitals(SampleTriplet::default());

        pipeline.feed_all(&frame[..5]);
        pipeline.reset_decoder();
        pipeline.feed_all(&frame[5..]);
        pipeline.feed_all(&frame);

        assert_eq!(pipeline.observer().samples.len(), 1);
        assert_eq!(pipeline.decoder_stats().frames_dropped, 1);
    }
}
