use super::*;

#[test]
fn parses_hex_rgb_and_rgba() {
    assert_eq!(parse_color("#ff0000").unwrap(), Color::rgba(255, 0, 0, 255));
    assert_eq!(parse_color("0000FF80").unwrap(), Color::rgba(0, 0, 255, 128));
    assert_eq!(parse_color("#0f8").unwrap(), Color::rgba(0, 255, 136, 255));
}

#[test]
fn parses_names_case_insensitively() {
    assert_eq!(parse_color("White").unwrap(), Color::rgba(255, 255, 255, 255));
    assert_eq!(parse_color(" transparent ").unwrap(), Color::rgba(0, 0, 0, 0));
    assert_eq!("grey".parse::<Color>().unwrap(), Color::rgba(128, 128, 128, 255));
}

#[test]
fn rejects_malformed_strings() {
    for bad in ["", "#", "#12345", "#gg0000", "chartreuse-ish", "#ＦＦ0000"] {
        let err = parse_color(bad).unwrap_err();
        assert!(matches!(err, RenderError::Parse(_)), "{bad:?} gave {err}");
    }
}

#[test]
fn packs_into_backend_format() {
    let c = Color::rgba(1, 2, 3, 4);
    assert_eq!(c.to_pixel(PixelFormat::Argb), 0x0401_0203);
    assert_eq!(c.to_pixel(PixelFormat::Abgr), 0x0403_0201);
}
