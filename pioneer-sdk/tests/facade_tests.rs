//! End-to-end facade tests against a mock AVR.

mod support;

use std::sync::{Arc, Mutex as StdMutex};

use pioneer_sdk::{
    ParamKey, ParamValue, PioneerAvr, SdkError, SessionError, SourceSelect, TunerBand, Zone,
};

use support::{wait_until, MockAvr, Script};

/// Two-zone AVR script: Main and Zone 2 respond, both powered on.
fn two_zone_script() -> Script {
    Arc::new(|frame| {
        let reply = match frame {
            "?P" | "PO" => "PWR0",
            "?V" => "VOL121",
            "VU" => "VOL122",
            "VD" => "VOL121",
            "?M" => "MUT1",
            "?F" => "FN19",
            "19FN" => "FN19",
            "0001SR" => "SR0001",
            "?AP" => "APR0",
            "?ZV" => "ZV40",
            "?Z2M" => "Z2MUT1",
            "?ZS" => "Z2F04",
            _ => "E04",
        };
        vec![reply.to_string()]
    })
}

fn fast_params() -> Vec<(ParamKey, ParamValue)> {
    vec![
        (ParamKey::CommandDelay, ParamValue::Float(0.0)),
        (ParamKey::Timeout, ParamValue::Float(1.0)),
        (ParamKey::ScanInterval, ParamValue::Float(30.0)),
        (
            ParamKey::EnabledFunctions,
            ParamValue::StrList(vec!["basic".to_string()]),
        ),
    ]
}

async fn connect_avr(mock: &MockAvr, extra: Vec<(ParamKey, ParamValue)>) -> PioneerAvr {
    let mut params = fast_params();
    params.extend(extra);
    let avr = PioneerAvr::with_params(mock.host(), mock.port(), params).unwrap();
    avr.connect(false).await.unwrap();
    avr.session().wait().await;
    avr
}

#[tokio::test]
async fn test_volume_clamp_per_zone() {
    let script: Script = Arc::new(|frame| {
        let reply = match frame {
            "?P" => "PWR0".to_string(),
            "?V" => "VOL121".to_string(),
            "?M" => "MUT1".to_string(),
            "?F" => "FN19".to_string(),
            "?AP" => "APR0".to_string(),
            "?ZV" => "ZV40".to_string(),
            "?Z2M" => "Z2MUT1".to_string(),
            "?ZS" => "Z2F04".to_string(),
            frame if frame.ends_with("ZV") && frame.len() == 4 => {
                format!("ZV{}", &frame[..2])
            }
            _ => "E04".to_string(),
        };
        vec![reply]
    });
    let mock = MockAvr::start(script).await;
    let avr = connect_avr(
        &mock,
        vec![(ParamKey::MaxVolumeZonex, ParamValue::Int(81))],
    )
    .await;
    assert!(avr.properties().has_zone(Zone::Zone2));

    let err = avr.set_volume_level(90, Zone::Zone2).await;
    assert!(matches!(err, Err(SdkError::VolumeOutOfRange { max: 81, .. })));
    // Nothing was sent for the rejected volume.
    assert_eq!(mock.count("90ZV"), 0);

    avr.set_volume_level(45, Zone::Zone2).await.unwrap();
    assert_eq!(avr.properties().volume(Zone::Zone2), Some(45));

    avr.shutdown().await;
}

#[tokio::test]
async fn test_ambiguous_source_name_rejected() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    avr.properties().add_source("19", "HDMI");
    avr.properties().add_source("20", "HDMI");

    let err = avr.select_source("HDMI", Zone::Main).await;
    assert!(matches!(err, Err(SdkError::AmbiguousSource(_))));

    let err = avr.select_source("LASERDISC", Zone::Main).await;
    assert!(matches!(err, Err(SdkError::UnknownSource(_))));

    // Selecting by id succeeds.
    avr.select_source(19u8, Zone::Main).await.unwrap();
    assert_eq!(mock.count("19FN"), 1);

    avr.shutdown().await;
}

#[tokio::test]
async fn test_zone_source_list_restricts_selection() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    // "19" (HDMI1) is not in the default Zone 2 source list.
    let err = avr
        .select_source(SourceSelect::id("19"), Zone::Zone2)
        .await;
    assert!(matches!(err, Err(SdkError::UnknownSource(_))));

    avr.shutdown().await;
}

#[tokio::test]
async fn test_tuner_step_fallback_exact_step_count() {
    let frequency = Arc::new(StdMutex::new(8750_i64));
    let script: Script = {
        let frequency = Arc::clone(&frequency);
        Arc::new(move |frame| {
            let reply = match frame {
                "?P" => "PWR0".to_string(),
                "?V" => "VOL100".to_string(),
                "?M" => "MUT1".to_string(),
                "?F" => "FN02".to_string(), // tuner selected
                "00TN" | "?FR" => format!("FR{:05}", *frequency.lock().unwrap()),
                "TAC" => "E04".to_string(), // no direct frequency entry
                "TFI" => {
                    let mut freq = frequency.lock().unwrap();
                    *freq += 10;
                    format!("FR{:05}", *freq)
                }
                "TFD" => {
                    let mut freq = frequency.lock().unwrap();
                    *freq -= 10;
                    format!("FR{:05}", *freq)
                }
                _ => "E04".to_string(),
            };
            vec![reply]
        })
    };
    let mock = MockAvr::start(script).await;
    let avr = connect_avr(&mock, vec![]).await;

    avr.set_tuner_frequency(TunerBand::Fm, 90.10).await.unwrap();

    // 87.50 -> 90.10 at 0.1 MHz per step is exactly 26 up commands.
    assert_eq!(mock.count("TFI"), 26);
    assert_eq!(mock.count("TFD"), 0);
    let tuned = avr.properties().tuner().frequency.unwrap();
    assert!((tuned - 90.10).abs() < 0.05);

    avr.shutdown().await;
}

#[tokio::test]
async fn test_tuner_frequency_validation() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    let err = avr.set_tuner_frequency(TunerBand::Fm, 150.0).await;
    assert!(matches!(err, Err(SdkError::FrequencyOutOfRange { .. })));

    // Tuner not selected on any zone.
    let err = avr.set_tuner_frequency(TunerBand::Fm, 90.1).await;
    assert!(matches!(err, Err(SdkError::TunerUnavailable)));

    avr.shutdown().await;
}

#[tokio::test]
async fn test_power_on_volume_bounce() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(
        &mock,
        vec![(ParamKey::PowerOnVolumeBounce, ParamValue::Bool(true))],
    )
    .await;

    avr.power_on(Zone::Main).await.unwrap();
    let bounced = wait_until(1000, || mock.count("VU") == 1 && mock.count("VD") == 1).await;
    assert!(bounced, "volume bounce should follow main zone power on");

    let received = mock.received();
    let po = received.iter().position(|frame| frame == "PO").unwrap();
    let vu = received.iter().position(|frame| frame == "VU").unwrap();
    let vd = received.iter().position(|frame| frame == "VD").unwrap();
    assert!(po < vu && vu < vd);

    avr.shutdown().await;
}

#[tokio::test]
async fn test_power_on_dedup_sends_one_frame() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    // Hold the executor busy so both intents land while the queue is live.
    let _ = avr
        .session()
        .enqueue(pioneer_sdk::CommandItem::new("_sleep").arg(0.2));

    // Issue both before the first can complete.
    let first = {
        let avr = avr.clone();
        tokio::spawn(async move { avr.power_on(Zone::Main).await })
    };
    let second = {
        let avr = avr.clone();
        tokio::spawn(async move { avr.power_on(Zone::Main).await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    avr.session().wait().await;

    assert_eq!(mock.count("PO"), 1, "duplicate power on must be deduped");

    avr.shutdown().await;
}

#[tokio::test]
async fn test_build_source_dict() {
    let script: Script = Arc::new(|frame| {
        let reply = match frame {
            "?P" => "PWR0".to_string(),
            "?V" => "VOL121".to_string(),
            "?M" => "MUT1".to_string(),
            "?F" => "FN01".to_string(),
            "?RGB01" => "RGB011CD        ".to_string(),
            "?RGB02" => "RGB021TUNER     ".to_string(),
            _ => "E04".to_string(),
        };
        vec![reply]
    });
    let mock = MockAvr::start(script).await;
    let avr = connect_avr(&mock, vec![(ParamKey::MaxSourceId, ParamValue::Int(3))]).await;

    avr.build_source_dict().await.unwrap();
    let dict = avr.get_source_dict(None);
    assert_eq!(dict.get("CD").map(String::as_str), Some("01"));
    assert_eq!(dict.get("TUNER").map(String::as_str), Some("02"));
    // Id 00 answered nothing and falls back to the default source table.
    assert_eq!(dict.get("PHONO").map(String::as_str), Some("00"));
    assert_eq!(dict.len(), 3);
    assert_eq!(avr.get_source_name("01"), "CD");

    // The cached source name follows the dictionary.
    mock.send("FN01").await;
    let named = {
        let avr = avr.clone();
        wait_until(1000, move || {
            avr.properties().source_name(Zone::Main).as_deref() == Some("CD")
        })
        .await
    };
    assert!(named);

    avr.shutdown().await;
}

#[tokio::test]
async fn test_source_dict_round_trip() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    let mut dict = std::collections::HashMap::new();
    dict.insert("CD".to_string(), "01".to_string());
    dict.insert("TV".to_string(), "05".to_string());
    avr.set_source_dict(dict.clone());
    assert_eq!(avr.get_source_dict(None), dict);

    avr.shutdown().await;
}

#[tokio::test]
async fn test_select_listening_mode() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    let modes = avr.get_listening_modes();
    assert!(modes.values().any(|name| name == "STEREO"));

    avr.select_listening_mode("STEREO").await.unwrap();
    assert_eq!(mock.count("0001SR"), 1);

    let err = avr.select_listening_mode("DISCO NIGHTS").await;
    assert!(matches!(err, Err(SdkError::UnknownListeningMode(_))));

    avr.shutdown().await;
}

#[tokio::test]
async fn test_send_command_ignore_error() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    // The mock answers E04 to listening mode queries.
    let err = avr
        .send_command("query_listening_mode", Zone::Main, "", "", None, false)
        .await;
    assert!(matches!(
        err,
        Err(SdkError::Session(SessionError::Device { .. }))
    ));

    let demoted = avr
        .send_command("query_listening_mode", Zone::Main, "", "", Some(true), false)
        .await
        .unwrap();
    assert!(demoted.is_none());

    avr.shutdown().await;
}

#[tokio::test]
async fn test_unavailable_after_disconnect() {
    let mock = MockAvr::start(two_zone_script()).await;
    let avr = connect_avr(&mock, vec![]).await;

    avr.disconnect(Some(false)).await;
    assert!(!avr.available());

    let err = avr.power_on(Zone::Main).await;
    assert!(matches!(
        err,
        Err(SdkError::Session(SessionError::Unavailable))
    ));
    let err = avr.refresh(None, false).await;
    assert!(matches!(
        err,
        Err(SdkError::Session(SessionError::Unavailable))
    ));

    avr.shutdown().await;
    let err = avr.send_raw_command("?P", false).await;
    assert!(matches!(
        err,
        Err(SdkError::Session(SessionError::Unavailable))
    ));
}

#[tokio::test]
async fn test_unknown_zone_rejected() {
    let script: Script = Arc::new(|frame| {
        let reply = match frame {
            "?P" => "PWR0",
            "?V" => "VOL121",
            "?M" => "MUT1",
            "?F" => "FN19",
            _ => "E04", // no other zones
        };
        vec![reply.to_string()]
    });
    let mock = MockAvr::start(script).await;
    let avr = connect_avr(&mock, vec![]).await;

    assert!(!avr.properties().has_zone(Zone::HdZone));
    let err = avr.power_on(Zone::HdZone).await;
    assert!(matches!(err, Err(SdkError::UnknownZone(Zone::HdZone))));

    avr.shutdown().await;
}

#[tokio::test]
async fn test_volume_step_only_expansion() {
    let volume = Arc::new(StdMutex::new(100_i64));
    let script: Script = {
        let volume = Arc::clone(&volume);
        Arc::new(move |frame| {
            let reply = match frame {
                "?P" => "PWR0".to_string(),
                "?V" => format!("VOL{:03}", *volume.lock().unwrap()),
                "?M" => "MUT1".to_string(),
                "?F" => "FN19".to_string(),
                "VU" => {
                    let mut vol = volume.lock().unwrap();
                    *vol += 1;
                    format!("VOL{:03}", *vol)
                }
                "VD" => {
                    let mut vol = volume.lock().unwrap();
                    *vol -= 1;
                    format!("VOL{:03}", *vol)
                }
                _ => "E04".to_string(),
            };
            vec![reply]
        })
    };
    let mock = MockAvr::start(script).await;
    let avr = connect_avr(
        &mock,
        vec![(ParamKey::VolumeStepOnly, ParamValue::Bool(true))],
    )
    .await;

    avr.set_volume_level(105, Zone::Main).await.unwrap();
    assert_eq!(mock.count("VU"), 5);
    assert_eq!(avr.properties().volume(Zone::Main), Some(105));

    avr.set_volume_level(103, Zone::Main).await.unwrap();
    assert_eq!(mock.count("VD"), 2);
    assert_eq!(avr.properties().volume(Zone::Main), Some(103));

    avr.shutdown().await;
}
