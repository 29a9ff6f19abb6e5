use media_value::{detect, Platform};

#[test]
fn detects_known_platforms() {
    let cases = [
        ("https://instagram.com/p/abc", Platform::Instagram),
        ("https://www.instagram.com/reel/xyz/", Platform::Instagram),
        ("https://x.com/u/1", Platform::X),
        ("https://twitter.com/u/1", Platform::X),
        ("https://www.facebook.com/brand/posts/1", Platform::Facebook),
        ("https://www.linkedin.com/feed/update/urn:li:activity:1", Platform::LinkedIn),
        ("https://www.tiktok.com/@user/video/1", Platform::TikTok),
        ("https://www.youtube.com/watch?v=abc", Platform::YouTube),
    ];
    for (url, expected) in cases {
        assert_eq!(detect(url), expected, "url: {}", url);
    }
}

#[test]
fn unmatched_input_is_unknown() {
    assert_eq!(detect("https://example.com"), Platform::Unknown);
    assert_eq!(detect(""), Platform::Unknown);
    assert_eq!(detect("not a url at all"), Platform::Unknown);
    assert_eq!(detect("https://youtu.be/abc"), Platform::Unknown);
}

#[test]
fn matching_is_case_sensitive() {
    assert_eq!(detect("https://Instagram.COM/p/abc"), Platform::Unknown);
    assert_eq!(detect("HTTPS://X.COM/u/1"), Platform::Unknown);
}

#[test]
fn first_pattern_in_order_wins() {
    assert_eq!(detect("https://facebook.com/share?u=https://x.com/a"), Platform::X);
    assert_eq!(detect("https://tiktok.com/@a?via=linkedin.com"), Platform::LinkedIn);
}

#[test]
fn labels_serialize_as_display_names() {
    assert_eq!(Platform::LinkedIn.to_string(), "LinkedIn");
    assert_eq!(
        serde_json::to_string(&Platform::YouTube).expect("serialize"),
        "\"YouTube\""
    );
    let parsed: Platform = serde_json::from_str("\"TikTok\"").expect("parse");
    assert_eq!(parsed, Platform::TikTok);
}
