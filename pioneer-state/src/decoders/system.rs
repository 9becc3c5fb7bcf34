//! Decoders for device information and display responses.

use pioneer_api::Zone;

use crate::decoder::DecoderRegistry;
use crate::params::AvrParams;
use crate::properties::AvrProperties;

/// `RGD` frames look like `RGD<0446:VSX-930/B>`; the model name sits between
/// the colon and the variant suffix.
fn decode_model(code: &str, props: &AvrProperties, params: &AvrParams) -> Vec<Zone> {
    let inner = code
        .trim_start_matches('<')
        .trim_end_matches('>');
    let model = inner
        .split('/')
        .next()
        .and_then(|part| part.split(':').next_back())
        .unwrap_or(inner)
        .trim();
    if model.is_empty() {
        return vec![];
    }
    if props.set_model(model) {
        params.set_default_params_model(model);
    }
    vec![Zone::All]
}

/// `SSI` frames quote the software version: `SSI"1.368"`.
fn decode_software_version(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    let version = code.trim_matches('"').trim();
    if version.is_empty() {
        return vec![];
    }
    props.set_software_version(version);
    vec![Zone::All]
}

/// `SVB` frames carry the MAC address as twelve hex digits.
fn decode_mac_addr(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    let digits: String = code.chars().filter(char::is_ascii_alphanumeric).collect();
    if digits.len() != 12 {
        return vec![];
    }
    let mac = digits
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).to_lowercase())
        .collect::<Vec<_>>()
        .join(":");
    props.set_mac_addr(&mac);
    vec![Zone::All]
}

/// `RGB` frames answer source-name queries: two-digit id, a default-name
/// flag, then the name padded with spaces.
fn decode_source_name(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    if code.len() < 4 {
        return vec![];
    }
    let id = &code[..2];
    let name = &code[3..];
    props.add_source(id, name);
    vec![]
}

/// `FL` frames carry the front display as hex-encoded ASCII after two flag
/// digits.
fn decode_display(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    if code.len() < 2 {
        return vec![];
    }
    let mut text = String::new();
    let hex = &code[2..];
    let bytes = hex.as_bytes();
    for pair in bytes.chunks(2) {
        if pair.len() != 2 {
            break;
        }
        let Ok(value) = u8::from_str_radix(std::str::from_utf8(pair).unwrap_or("00"), 16) else {
            return vec![];
        };
        if value.is_ascii() && !value.is_ascii_control() {
            text.push(value as char);
        }
    }
    props.set_setting("system", "display", text.trim_end());
    vec![Zone::All]
}

pub(super) fn register(registry: &mut DecoderRegistry) {
    registry.register("RGD", decode_model);
    registry.register("SSI", decode_software_version);
    registry.register("SVB", decode_mac_addr);
    registry.register("RGB", decode_source_name);
    registry.register("FL", decode_display);
}
