// Tests for config key-name parsing.

use crossterm::event::KeyCode;
use voicetake::input::{parse_key, KeyBindings};

#[test]
fn test_named_keys_parse() {
    assert_eq!(parse_key("space").unwrap(), KeyCode::Char(' '));
    assert_eq!(parse_key("delete").unwrap(), KeyCode::Delete);
    assert_eq!(parse_key("del").unwrap(), KeyCode::Delete);
    assert_eq!(parse_key("enter").unwrap(), KeyCode::Enter);
    assert_eq!(parse_key("ESC").unwrap(), KeyCode::Esc);
    assert_eq!(parse_key("backspace").unwrap(), KeyCode::Backspace);
    assert_eq!(parse_key("tab").unwrap(), KeyCode::Tab);
}

#[test]
fn test_single_characters_parse() {
    assert_eq!(parse_key("r").unwrap(), KeyCode::Char('r'));
    assert_eq!(parse_key("X").unwrap(), KeyCode::Char('x'));
}

#[test]
fn test_unknown_names_are_rejected() {
    assert!(parse_key("hyperspace").is_err());
    assert!(parse_key("").is_err());
}

#[test]
fn test_bindings_from_names() {
    let bindings = KeyBindings::from_names("space", "delete").unwrap();
    assert_eq!(bindings.primary, KeyCode::Char(' '));
    assert_eq!(bindings.cancel, KeyCode::Delete);

    assert!(KeyBindings::from_names("space", "nope").is_err());
}
