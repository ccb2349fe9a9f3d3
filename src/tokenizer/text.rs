//! The text tokeniser: single-byte lookahead, one-byte push-back.
//!
//! Grounded on `core/tokenizer.py`. Whitespace is bytes
//! `{0, 9, 10, 12, 13, 32}` and control bytes below 32; CR-LF counts as
//! one newline.

use super::{binary, syntax_error, NameLookup, TokenOutcome};
use crate::bytestream::ByteSource;
use crate::error::{Error, ErrorKind};
use crate::object::{Name, Number, Object, Value, VmOrigin};
use crate::vm::{Backing, Vm};

const TAB: u8 = 9;
const LINE_FEED: u8 = 10;
const FORM_FEED: u8 = 12;
const RETURN: u8 = 13;
const SPACE: u8 = 32;

fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | TAB | LINE_FEED | FORM_FEED | RETURN | SPACE) || b < 32
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// CR, LF and CR-LF all count as one newline.
fn handle_newline(source: &mut dyn ByteSource, b: u8) -> bool {
    match b {
        RETURN => {
            source.note_newline();
            if let Some(next) = source.read_byte() {
                if next != LINE_FEED {
                    source.unread_byte(next);
                }
            }
            true
        }
        LINE_FEED | FORM_FEED => {
            source.note_newline();
            true
        }
        _ => false,
    }
}

fn skip_ws_and_comments(source: &mut dyn ByteSource) -> Option<u8> {
    loop {
        let b = source.read_byte()?;
        if handle_newline(source, b) {
            continue;
        }
        if is_whitespace(b) {
            continue;
        }
        if b == b'%' {
            loop {
                match source.read_byte() {
                    None => return None,
                    Some(c) if handle_newline(source, c) => break,
                    Some(_) => continue,
                }
            }
            continue;
        }
        return Some(b);
    }
}

fn read_bare_token(source: &mut dyn ByteSource, first: u8) -> Vec<u8> {
    let mut buf = vec![first];
    loop {
        match source.read_byte() {
            None => break,
            Some(b) if is_whitespace(b) || is_delimiter(b) => {
                source.unread_byte(b);
                break;
            }
            Some(b) => buf.push(b),
        }
    }
    buf
}

enum NumberOrName {
    Number(Number),
    Name(Vec<u8>),
    LimitCheck,
}

fn try_parse_number(tok: &[u8]) -> NumberOrName {
    let s = match std::str::from_utf8(tok) {
        Ok(s) => s,
        Err(_) => return NumberOrName::Name(tok.to_vec()),
    };

    if let Some(hash) = s.find('#') {
        let (base_str, digits) = (&s[..hash], &s[hash + 1..]);
        if let Ok(base) = base_str.parse::<u32>() {
            if (2..=36).contains(&base) && !digits.is_empty() {
                let mut value: u32 = 0;
                let mut ok = true;
                for c in digits.chars() {
                    match c.to_digit(36) {
                        Some(d) if d < base => value = value.wrapping_mul(base).wrapping_add(d),
                        _ => {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    return NumberOrName::Number(Number::Int(value as i32));
                }
            }
        }
        return NumberOrName::Name(tok.to_vec());
    }

    // Decimal integer.
    if s.chars().enumerate().all(|(i, c)| c.is_ascii_digit() || (i == 0 && (c == '+' || c == '-'))) {
        if let Ok(i) = s.parse::<i32>() {
            return NumberOrName::Number(Number::Int(i));
        }
        if let Ok(r) = s.parse::<f64>() {
            if r.is_finite() {
                return NumberOrName::Number(Number::Real(r));
            }
            return NumberOrName::LimitCheck;
        }
        return NumberOrName::Name(tok.to_vec());
    }

    // Decimal real: digits, optional '.', optional exponent.
    let looks_real = s.chars().enumerate().all(|(i, c)| {
        c.is_ascii_digit()
            || c == '.'
            || c == 'e'
            || c == 'E'
            || ((c == '+' || c == '-') && (i == 0 || matches!(s.as_bytes()[i - 1], b'e' | b'E')))
    }) && s.chars().any(|c| c.is_ascii_digit());
    if looks_real {
        match s.parse::<f64>() {
            Ok(r) if r.is_finite() => NumberOrName::Number(Number::Real(r)),
            Ok(_) => NumberOrName::LimitCheck,
            Err(_) => NumberOrName::Name(tok.to_vec()),
        }
    } else {
        NumberOrName::Name(tok.to_vec())
    }
}

fn read_literal_string(source: &mut dyn ByteSource) -> Result<Vec<u8>, Error> {
    let mut depth = 1u32;
    let mut out = Vec::new();
    loop {
        let b = match source.read_byte() {
            Some(b) => b,
            None => return Err(syntax_error(source, "string")),
        };
        match b {
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
                out.push(b);
            }
            b'\\' => {
                let esc = match source.read_byte() {
                    Some(e) => e,
                    None => return Err(syntax_error(source, "string")),
                };
                match esc {
                    b'n' => out.push(LINE_FEED),
                    b'r' => out.push(RETURN),
                    b't' => out.push(TAB),
                    b'b' => out.push(8),
                    b'f' => out.push(FORM_FEED),
                    b'\\' => out.push(b'\\'),
                    b'(' => out.push(b'('),
                    b')' => out.push(b')'),
                    RETURN | LINE_FEED => {
                        handle_newline(source, esc);
                        // line continuation: absorbed, no byte emitted
                    }
                    d @ b'0'..=b'7' => {
                        let mut val = (d - b'0') as u32;
                        for _ in 0..2 {
                            match source.read_byte() {
                                Some(o @ b'0'..=b'7') => val = val * 8 + (o - b'0') as u32,
                                Some(other) => {
                                    source.unread_byte(other);
                                    break;
                                }
                                None => break,
                            }
                        }
                        out.push((val % 256) as u8);
                    }
                    other => out.push(other), // unknown \x drops the backslash
                }
            }
            b if handle_newline(source, b) => out.push(LINE_FEED),
            b => out.push(b),
        }
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn read_hex_string(source: &mut dyn ByteSource) -> Result<Vec<u8>, Error> {
    let mut nibbles = Vec::new();
    loop {
        let b = match source.read_byte() {
            Some(b) => b,
            None => return Err(syntax_error(source, "string")),
        };
        if b == b'>' {
            break;
        }
        if is_whitespace(b) {
            continue;
        }
        match hex_digit(b) {
            Some(n) => nibbles.push(n),
            None => return Err(syntax_error(source, "string")),
        }
    }
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    Ok(nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
}

fn ascii85_group(values: &[u8]) -> Result<Vec<u8>, ()> {
    if values.len() < 2 || values.len() > 5 {
        return Err(());
    }
    let mut padded = [84u8; 5];
    padded[..values.len()].copy_from_slice(values);
    let mut value: u64 = 0;
    for d in padded {
        if d > 84 {
            return Err(());
        }
        value = value * 85 + u64::from(d);
    }
    if value > 0xFFFF_FFFF {
        return Err(());
    }
    let bytes = (value as u32).to_be_bytes();
    Ok(bytes[..values.len() - 1].to_vec())
}

fn read_ascii85_string(source: &mut dyn ByteSource) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut group: Vec<u8> = Vec::with_capacity(5);
    loop {
        let b = match source.read_byte() {
            Some(b) => b,
            None => return Err(syntax_error(source, "string")),
        };
        if is_whitespace(b) {
            continue;
        }
        if b == b'~' {
            let close = source.read_byte();
            if close != Some(b'>') {
                return Err(syntax_error(source, "string"));
            }
            if group.len() == 1 {
                return Err(syntax_error(source, "string"));
            }
            if !group.is_empty() {
                match ascii85_group(&group) {
                    Ok(bytes) => out.extend(bytes),
                    Err(()) => return Err(syntax_error(source, "string")),
                }
            }
            return Ok(out);
        }
        if b == b'z' && group.is_empty() {
            out.extend([0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            return Err(syntax_error(source, "string"));
        }
        group.push(b - b'!');
        if group.len() == 5 {
            match ascii85_group(&group) {
                Ok(bytes) => out.extend(bytes),
                Err(()) => return Err(syntax_error(source, "string")),
            }
            group.clear();
        }
    }
}

pub(super) fn read_token(
    source: &mut dyn ByteSource,
    vm: &mut Vm,
    origin: VmOrigin,
    lookup: &mut dyn NameLookup,
) -> Result<TokenOutcome, Error> {
    let first = match skip_ws_and_comments(source) {
        Some(b) => b,
        None => return Ok(TokenOutcome::Eof),
    };

    if (128..=159).contains(&first) {
        return binary::dispatch(first, source, vm, origin, lookup);
    }

    match first {
        b'{' => Ok(TokenOutcome::OpenProc),
        b'}' => Ok(TokenOutcome::CloseProc),
        b'[' => Ok(TokenOutcome::Value(Value::executable(Object::Name(Name::new(b"["))))),
        b']' => Ok(TokenOutcome::Value(Value::executable(Object::Name(Name::new(b"]"))))),
        b'<' => match source.read_byte() {
            Some(b'<') => Ok(TokenOutcome::Value(Value::executable(Object::Name(Name::new(b"<<"))))),
            Some(b'~') => {
                let bytes = read_ascii85_string(source)?;
                let r = vm.alloc(origin, Backing::String(bytes));
                let len = vm.get(r).and_then(|b| b.as_string()).map_or(0, Vec::len);
                Ok(TokenOutcome::Value(Value::literal(Object::String(r, crate::object::View { offset: 0, length: len }))))
            }
            Some(b) => {
                source.unread_byte(b);
                let bytes = read_hex_string(source)?;
                let r = vm.alloc(origin, Backing::String(bytes));
                let len = vm.get(r).and_then(|b| b.as_string()).map_or(0, Vec::len);
                Ok(TokenOutcome::Value(Value::literal(Object::String(r, crate::object::View { offset: 0, length: len }))))
            }
            None => Err(syntax_error(source, "token")),
        },
        b'>' => match source.read_byte() {
            Some(b'>') => Ok(TokenOutcome::Value(Value::executable(Object::Name(Name::new(b">>"))))),
            _ => Err(syntax_error(source, "token")),
        },
        b'(' => {
            let bytes = read_literal_string(source)?;
            let r = vm.alloc(origin, Backing::String(bytes));
            let len = vm.get(r).and_then(|b| b.as_string()).map_or(0, Vec::len);
            Ok(TokenOutcome::Value(Value::literal(Object::String(r, crate::object::View { offset: 0, length: len }))))
        }
        b'/' => {
            let immediate = match source.read_byte() {
                Some(b'/') => true,
                Some(b) => {
                    source.unread_byte(b);
                    false
                }
                None => false,
            };
            let mut bytes = Vec::new();
            loop {
                match source.read_byte() {
                    None => break,
                    Some(b) if is_whitespace(b) || is_delimiter(b) => {
                        source.unread_byte(b);
                        break;
                    }
                    Some(b) => bytes.push(b),
                }
            }
            let name = Name::new(&bytes);
            if immediate {
                match lookup.lookup(vm, &name) {
                    Some(v) => Ok(TokenOutcome::Value(Value::literal(v.object))),
                    None => Err(Error::new(ErrorKind::Undefined, "token")),
                }
            } else {
                Ok(TokenOutcome::Value(Value::literal(Object::Name(name))))
            }
        }
        _ => {
            let tok = read_bare_token(source, first);
            match try_parse_number(&tok) {
                NumberOrName::Number(Number::Int(i)) => Ok(TokenOutcome::Value(Value::literal(Object::Int(i)))),
                NumberOrName::Number(Number::Real(r)) => Ok(TokenOutcome::Value(Value::literal(Object::Real(r)))),
                NumberOrName::LimitCheck => Err(Error::new(ErrorKind::LimitCheck, "token")),
                NumberOrName::Name(bytes) => Ok(TokenOutcome::Value(Value::executable(Object::Name(Name::new(&bytes))))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytestream::SliceSource;

    struct NoLookup;
    impl NameLookup for NoLookup {
        fn lookup(&mut self, _vm: &Vm, _name: &Name) -> Option<Value> {
            None
        }
    }

    fn token(input: &[u8]) -> (TokenOutcome, Vm) {
        let mut vm = Vm::new();
        let mut src = SliceSource::new(input);
        let outcome = read_token(&mut src, &mut vm, VmOrigin::Local, &mut NoLookup).unwrap();
        (outcome, vm)
    }

    #[test]
    fn overflowing_integer_promotes_to_real() {
        let (outcome, _vm) = token(b"2147483648");
        match outcome {
            TokenOutcome::Value(v) => assert_eq!(v.object.as_number(), Some(Number::Real(2147483648.0))),
            _ => panic!("expected a value"),
        }
    }

    #[test]
    fn radix_number_wraps_to_signed() {
        let (outcome, _vm) = token(b"16#FFFFFFFF");
        match outcome {
            TokenOutcome::Value(v) => assert_eq!(v.object.as_number(), Some(Number::Int(-1))),
            _ => panic!("expected a value"),
        }
    }

    #[test]
    fn literal_name_is_literal_attribute() {
        let (outcome, _vm) = token(b"/foo");
        match outcome {
            TokenOutcome::Value(v) => {
                assert!(!v.is_executable());
                match v.object {
                    Object::Name(n) => assert_eq!(n.as_bytes(), b"foo"),
                    _ => panic!("expected a name"),
                }
            }
            _ => panic!("expected a value"),
        }
    }

    #[test]
    fn bare_word_is_executable_name() {
        let (outcome, _vm) = token(b"add");
        match outcome {
            TokenOutcome::Value(v) => assert!(v.is_executable()),
            _ => panic!("expected a value"),
        }
    }

    #[test]
    fn hex_string_pads_odd_nibble() {
        let (outcome, vm) = token(b"<ABC>");
        match outcome {
            TokenOutcome::Value(v) => match v.object {
                Object::String(r, view) => {
                    let bytes = vm.get(r).unwrap().as_string().unwrap();
                    assert_eq!(&bytes[view.offset..view.offset + view.length], &[0xAB, 0xC0]);
                }
                _ => panic!("expected a string"),
            },
            _ => panic!("expected a value"),
        }
    }

    #[test]
    fn open_brace_is_reported_distinctly() {
        let (outcome, _vm) = token(b"{");
        assert!(matches!(outcome, TokenOutcome::OpenProc));
    }

    #[test]
    fn crlf_counts_as_one_newline() {
        let mut vm = Vm::new();
        let mut src = SliceSource::new(b"\r\n5");
        let outcome = read_token(&mut src, &mut vm, VmOrigin::Local, &mut NoLookup).unwrap();
        assert!(matches!(outcome, TokenOutcome::Value(_)));
        assert_eq!(src.line_num(), 2);
    }
}
