use super::*;

#[test]
fn defaults_follow_text_element_contract() {
    let style = TextStyle::from_props(&FlatProps::new());
    assert_eq!(style.value, "");
    assert_eq!(style.font_name, "Open Sans");
    assert_eq!(style.font_size, 44.0);
    assert_eq!(style.color, Rgba::WHITE);
    assert_eq!(style.align, TextAlign::Left);
    assert_eq!(style.origin_y, OriginY::Top);
    assert!(style.shadow.is_none());
    assert_eq!(style.max_width(), None);
}

#[test]
fn alpha_applies_to_fill_color() {
    let props = FlatProps::new()
        .with("color", "#FF0000")
        .with("alpha", 0.5)
        .with("width", 300.0);
    let style = TextStyle::from_props(&props);
    assert_eq!(style.color, Rgba::rgba(1.0, 0.0, 0.0, 0.5));
    assert_eq!(style.max_width(), Some(300.0));
}

#[test]
fn shadow_requires_color_and_blur_radius() {
    let only_color = FlatProps::new().with("shadowColor", "#000000");
    assert!(TextStyle::from_props(&only_color).shadow.is_none());

    let only_blur = FlatProps::new().with("shadowBlurRadius", 4.0);
    assert!(TextStyle::from_props(&only_blur).shadow.is_none());

    let both = FlatProps::new()
        .with("shadowColor", "#112233")
        .with("shadowBlurRadius", 4.0)
        .with("shadowAlpha", 0.25);
    let shadow = TextStyle::from_props(&both).shadow.unwrap();
    assert_eq!(shadow.blur_radius, 4.0);
    assert_eq!(shadow.color.a, 0.25);
}

#[test]
fn align_and_origin_parse_with_fallbacks() {
    assert_eq!(TextAlign::parse("center"), TextAlign::Center);
    assert_eq!(TextAlign::parse("justified"), TextAlign::Justified);
    assert_eq!(TextAlign::parse("natural"), TextAlign::Natural);
    assert_eq!(TextAlign::parse("whatever"), TextAlign::Left);

    assert_eq!(OriginY::parse("bottom").shift(40.0), -40.0);
    assert_eq!(OriginY::parse("center").shift(40.0), -20.0);
    assert_eq!(OriginY::parse("top").shift(40.0), 0.0);
    assert_eq!(OriginY::parse("middle"), OriginY::Top);
}

#[test]
fn layout_rejects_unusable_font_bytes() {
    let style = TextStyle::from_props(&FlatProps::new().with("value", "hi"));
    let err = layout_text(&style, Arc::new(b"not a font".to_vec())).unwrap_err();
    assert!(matches!(err, CompositorError::ResourceUnavailable(_)));
}

#[test]
fn layout_rejects_non_positive_font_size() {
    let style = TextStyle::from_props(&FlatProps::new().with("fontSize", 0.0));
    let err = layout_text(&style, Arc::new(Vec::new())).unwrap_err();
    assert!(matches!(err, CompositorError::InvalidProperty(_)));
}
