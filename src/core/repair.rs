//! 工具参数解析与截断 JSON 修复
//!
//! 远端模型偶尔输出被截断的参数文本。修复只处理「尾部截断」：
//! - 未闭合字符串：丢弃悬空的 `\`、不完整的 `\uXXXX`，补上引号；代理对在低位写完前被截断时，
//!   一并丢弃落单的高位 `\uD800` 到 `\uDBFF`
//! - 截断的字面量前缀（`t` / `fal` / `nu` 等）补全为 true / false / null
//! - 截断的数字（`1.` / `-` / `2e` / `3e+`）裁到最长合法前缀，裁空则丢弃
//! - 末尾多余的 `,`、`:` 以及没有值的对象键被移除
//! - 所有未闭合的 `{` / `[` 按嵌套顺序补齐
//!
//! 不处理：未知裸词、括号不匹配、完整值之后的多余内容、中间缺失的逗号或冒号。
//! 这些情况返回 None，由调用方报告参数解析失败。

use serde_json::Value;

/// 解析工具参数：空文本视为 `{}`；直接解析失败时尝试修复后再解析
pub fn parse_arguments(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(parse_err) => {
            let repaired = repair_truncated(trimmed)
                .ok_or_else(|| format!("{parse_err}; text is not repairable"))?;
            tracing::debug!(repaired = %repaired, "repaired truncated tool arguments");
            serde_json::from_str(&repaired)
                .map_err(|e| format!("{parse_err}; repaired text still invalid: {e}"))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(char),
    Close(char),
    Colon,
    Comma,
    /// 已带引号的字符串原文；is_key 表示它处在对象键的位置
    Str { raw: String, is_key: bool },
    /// 数字或字面量原文
    Scalar(String),
}

#[derive(Clone, Copy, PartialEq)]
enum Frame {
    /// expect_key：下一个字符串是否为键
    Object { expect_key: bool },
    Array,
}

/// 补全被截断的 JSON 文本；无法按上述规则修复时返回 None
pub fn repair_truncated(text: &str) -> Option<String> {
    let mut tokens = tokenize(text)?;
    trim_dangling_tail(&mut tokens);

    let mut stack: Vec<char> = Vec::new();
    let mut out = String::with_capacity(text.len() + 8);
    for token in &tokens {
        match token {
            Token::Open(c) => {
                stack.push(*c);
                out.push(*c);
            }
            Token::Close(c) => {
                let open = stack.pop()?;
                if closer_for(open) != *c {
                    return None;
                }
                out.push(*c);
            }
            Token::Colon => out.push(':'),
            Token::Comma => out.push(','),
            Token::Str { raw, .. } | Token::Scalar(raw) => out.push_str(raw),
        }
    }
    while let Some(open) = stack.pop() {
        out.push(closer_for(open));
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn closer_for(open: char) -> char {
    if open == '{' {
        '}'
    } else {
        ']'
    }
}

/// 词法扫描；遇到无法识别的字符时返回 None。最后一个 token 可能是截断的，在此处补全。
fn tokenize(text: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '{' | '[' => {
                frames.push(if c == '{' {
                    Frame::Object { expect_key: true }
                } else {
                    Frame::Array
                });
                tokens.push(Token::Open(c));
                i += 1;
            }
            '}' | ']' => {
                frames.pop()?;
                tokens.push(Token::Close(c));
                i += 1;
            }
            ':' => {
                if let Some(Frame::Object { expect_key }) = frames.last_mut() {
                    *expect_key = false;
                }
                tokens.push(Token::Colon);
                i += 1;
            }
            ',' => {
                if let Some(Frame::Object { expect_key }) = frames.last_mut() {
                    *expect_key = true;
                }
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' => {
                let is_key = matches!(frames.last(), Some(Frame::Object { expect_key: true }));
                let (raw, next) = scan_string(&chars, i);
                tokens.push(Token::Str { raw, is_key });
                i = next;
            }
            '-' | '0'..='9' => {
                let start = i;
                while i < chars.len() && is_number_char(chars[i]) {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let truncated = i == chars.len();
                if let Some(num) = complete_number(&raw, truncated) {
                    tokens.push(Token::Scalar(num));
                }
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let literal = complete_literal(&word, i == chars.len())?;
                tokens.push(Token::Scalar(literal.to_string()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

/// 扫描从 start（开引号）起的字符串，返回带引号的原文与结束位置；未闭合时补引号
fn scan_string(chars: &[char], start: usize) -> (String, usize) {
    let mut raw = String::from('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            // 转义序列不完整时丢弃
            let Some(&next) = chars.get(i + 1) else {
                break;
            };
            if next == 'u' {
                let hex_end = i + 6;
                if hex_end > chars.len() {
                    break;
                }
                if is_high_surrogate(&chars[i + 2..hex_end]) && low_half_cut(&chars[hex_end..]) {
                    break;
                }
                raw.extend(&chars[i..hex_end]);
                i = hex_end;
            } else {
                raw.push(c);
                raw.push(next);
                i += 2;
            }
            continue;
        }
        raw.push(c);
        i += 1;
        if c == '"' {
            return (raw, i);
        }
    }
    raw.push('"');
    (raw, chars.len())
}

fn is_high_surrogate(hex: &[char]) -> bool {
    let hex: String = hex.iter().collect();
    u16::from_str_radix(&hex, 16).is_ok_and(|v| (0xD800..=0xDBFF).contains(&v))
}

/// 文本在代理对的低位 `\uXXXX` 写完之前就结束了
fn low_half_cut(rest: &[char]) -> bool {
    rest.len() < 6
        && rest.first().map_or(true, |&c| c == '\\')
        && rest.get(1).map_or(true, |&c| c == 'u')
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
}

/// 数字 token：未截断时原样返回交由 serde 校验；截断时裁掉尾部的 `.` `e` `+` `-`，裁空返回 None
fn complete_number(raw: &str, truncated: bool) -> Option<String> {
    if !truncated {
        return Some(raw.to_string());
    }
    let trimmed = raw.trim_end_matches(|c: char| matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 字面量：完整或（位于文本末尾时）为 true/false/null 的前缀
fn complete_literal(word: &str, at_end: bool) -> Option<&'static str> {
    ["true", "false", "null"]
        .into_iter()
        .find(|lit| *lit == word || (at_end && lit.starts_with(word)))
}

/// 移除尾部无法构成完整值的 token：逗号、冒号、没有值的键
fn trim_dangling_tail(tokens: &mut Vec<Token>) {
    loop {
        match tokens.last() {
            Some(Token::Comma) | Some(Token::Colon) => {
                tokens.pop();
            }
            Some(Token::Str { is_key: true, .. }) => {
                tokens.pop();
            }
            _ => break,
        }
    }
}
