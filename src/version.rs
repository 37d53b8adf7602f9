//! Version masquerade (spec §6 "Version masquerade").
//!
//! The host asks this library for a desktop-GL version; what it actually
//! runs on is an ES driver. Exactly one masquerade rule is picked here and
//! documented (spec.md's Open Questions note the source reports this
//! inconsistently, 4.5 in one place and 4.6 in another — see DESIGN.md for
//! the resolution): ES 3.2 always masquerades as 4.6.

/// The ES capability this crate detected at context creation, expressed as
/// `(major, minor)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EsCapability {
    pub major: u32,
    pub minor: u32,
}

/// Masqueraded desktop `(major, minor)` for a given ES capability (spec §6).
pub fn masquerade_version(es: EsCapability) -> (u32, u32) {
    if es.major > 3 || (es.major == 3 && es.minor >= 2) {
        (4, 6)
    } else if es.major == 3 && es.minor == 1 {
        (4, 3)
    } else {
        (3, 3)
    }
}

pub fn masquerade_version_string(es: EsCapability) -> String {
    let (major, minor) = masquerade_version(es);
    format!("{major}.{minor} VelocityGL")
}

pub fn masquerade_renderer_string(device_renderer: &str) -> String {
    format!("VelocityGL ({device_renderer})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn es_3_2_masquerades_as_4_6() {
        assert_eq!(masquerade_version(EsCapability { major: 3, minor: 2 }), (4, 6));
    }

    #[test]
    fn es_3_1_masquerades_as_4_3() {
        assert_eq!(masquerade_version(EsCapability { major: 3, minor: 1 }), (4, 3));
    }

    #[test]
    fn es_3_0_masquerades_as_3_3() {
        assert_eq!(masquerade_version(EsCapability { major: 3, minor: 0 }), (3, 3));
    }

    #[test]
    fn renderer_string_wraps_device_renderer() {
        assert_eq!(masquerade_renderer_string("Mali-G710"), "VelocityGL (Mali-G710)");
    }

    #[test]
    fn version_string_matches_masquerade_rule() {
        assert_eq!(masquerade_version_string(EsCapability { major: 3, minor: 2 }), "4.6 VelocityGL");
    }
}
