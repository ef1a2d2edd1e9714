/// Integration tests for stream configuration negotiation

use roomcast_lib::audio::{
    AudioError, DeviceCapabilities, DeviceNegotiator, SampleFormat, SampleRateRange,
};
use roomcast_lib::config::AudioConfig;

fn device(formats: Vec<SampleFormat>, rates: Vec<SampleRateRange>) -> DeviceCapabilities {
    DeviceCapabilities {
        id: "hw:0,0".to_string(),
        name: "Scripted Device".to_string(),
        is_raw: false,
        formats,
        sample_rates: rates,
        channel_count: 2,
        probe_error: None,
    }
}

#[test]
fn test_priority_list_picks_44100() {
    println!("\n=== Negotiation Rate Priority Test ===");

    let caps = device(
        vec![SampleFormat::S16Le],
        vec![SampleRateRange::exact(44100), SampleRateRange::exact(96000)],
    );
    let negotiator = AudioConfig::default().negotiator();
    println!("Rate priority: {:?}", negotiator.rate_priority());

    let config = negotiator.negotiate(&caps).unwrap();
    println!("Negotiated: {}", config);

    assert_eq!(config.sample_rate(), 44100);
    println!("\n✓ 44100 chosen from {{44100, 96000}}");
}

#[test]
fn test_unlisted_formats_fall_back_without_error() {
    println!("\n=== Negotiation Format Fallback Test ===");

    // None of the device's formats are in the priority list
    let negotiator = DeviceNegotiator::new(vec![48000], vec![SampleFormat::Float32Le]);
    let caps = device(
        vec![SampleFormat::S24Be, SampleFormat::S16Le],
        vec![SampleRateRange::exact(48000)],
    );

    let config = negotiator.negotiate(&caps).unwrap();
    assert_eq!(config.sample_format(), SampleFormat::S24Be);

    println!("\n✓ Fell back to the first advertised format");
}

#[test]
fn test_rate_and_format_chosen_independently() {
    let caps = device(
        vec![SampleFormat::U8, SampleFormat::S32Le],
        vec![SampleRateRange::new(8000, 16000)],
    );

    let config = DeviceNegotiator::default().negotiate(&caps).unwrap();
    assert_eq!(config.sample_rate(), 16000);
    assert_eq!(config.sample_format(), SampleFormat::S32Le);
    assert_eq!(config.bytes_per_frame(), 8);
}

#[test]
fn test_probe_failure_never_yields_a_config() {
    let mut caps = device(vec![SampleFormat::S16Le], vec![SampleRateRange::exact(48000)]);
    caps.probe_error = Some("permission denied".to_string());

    let result = DeviceNegotiator::default().negotiate(&caps);
    assert!(matches!(result, Err(AudioError::ProbeFailed(_))));
}
