//! 中文章节数字转换。
//!
//! 支持两种写法：
//! - 带权位：`一千二百零三`、`十五`，零只是占位符，转换前去除
//! - 无权位：`一二三`，逐位拼接后按十进制读出
//!
//! 阿拉伯数字（含全角）按无权位数字处理。

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumeralError {
    #[error("章节数为空")]
    Empty,
    #[error("无法识别的章节数字符 '{symbol}'（原文: {input}）")]
    UnknownSymbol { symbol: char, input: String },
    #[error("章节数超出范围: {0}")]
    Overflow(String),
}

const ZEROS: [char; 2] = ['零', '〇'];

fn weight_of(c: char) -> Option<u64> {
    match c {
        '十' => Some(10),
        '百' => Some(100),
        '千' => Some(1000),
        _ => None,
    }
}

fn digit_of(c: char) -> Option<u64> {
    match c {
        '零' | '〇' => Some(0),
        '一' => Some(1),
        '二' | '两' => Some(2),
        '三' => Some(3),
        '四' => Some(4),
        '五' => Some(5),
        '六' => Some(6),
        '七' => Some(7),
        '八' => Some(8),
        '九' => Some(9),
        '0'..='9' => Some(c as u64 - '0' as u64),
        '０'..='９' => Some(c as u64 - '０' as u64),
        _ => None,
    }
}

/// 将中文数字转换为整数
pub fn convert(numeral: &str) -> Result<u64, NumeralError> {
    let chars: Vec<char> = numeral.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err(NumeralError::Empty);
    }

    if let Some(&symbol) = chars
        .iter()
        .find(|&&c| digit_of(c).is_none() && weight_of(c).is_none())
    {
        return Err(NumeralError::UnknownSymbol {
            symbol,
            input: numeral.to_string(),
        });
    }

    if chars.iter().any(|&c| weight_of(c).is_some()) {
        convert_weighted(&chars, numeral)
    } else {
        convert_unweighted(&chars, numeral)
    }
}

fn convert_weighted(chars: &[char], input: &str) -> Result<u64, NumeralError> {
    let overflow = || NumeralError::Overflow(input.to_string());

    // 带权位的形式，零没有意义，去除零
    let stripped: Vec<char> = chars.iter().copied().filter(|c| !ZEROS.contains(c)).collect();

    let mut num: u64 = 0;
    let mut weight: u64 = 1;
    // 最近一次遇到、且左侧尚未出现数字的权位
    let mut pending: Option<u64> = None;

    for &item in stripped.iter().rev() {
        if let Some(w) = weight_of(item) {
            if let Some(implied) = pending.replace(w) {
                num = num.checked_add(implied).ok_or_else(overflow)?;
            }
            weight = w;
        } else if let Some(d) = digit_of(item) {
            pending = None;
            let value = d.checked_mul(weight).ok_or_else(overflow)?;
            num = num.checked_add(value).ok_or_else(overflow)?;
        }
    }

    // 开头的权位省略了“一”，如“十五”
    if let Some(implied) = pending {
        num = num.checked_add(implied).ok_or_else(overflow)?;
    }

    Ok(num)
}

fn convert_unweighted(chars: &[char], input: &str) -> Result<u64, NumeralError> {
    let digits: String = chars
        .iter()
        .filter_map(|&c| digit_of(c))
        .map(|d| char::from(b'0' + d as u8))
        .collect();

    digits
        .parse::<u64>()
        .map_err(|_| NumeralError::Overflow(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unweighted_concatenates_digits() {
        assert_eq!(convert("一二三").unwrap(), 123);
        assert_eq!(convert("九").unwrap(), 9);
        assert_eq!(convert("一零零八").unwrap(), 1008);
        assert_eq!(convert("二〇一").unwrap(), 201);
    }

    #[test]
    fn test_weighted_positional_expansion() {
        assert_eq!(convert("一千二百零三").unwrap(), 1203);
        assert_eq!(convert("一千二百三").unwrap(), 1203);
        assert_eq!(convert("三百四十五").unwrap(), 345);
        assert_eq!(convert("二十").unwrap(), 20);
        assert_eq!(convert("九千九百九十九").unwrap(), 9999);
    }

    #[test]
    fn test_leading_ten_implies_one() {
        assert_eq!(convert("十五").unwrap(), 15);
        assert_eq!(convert("十").unwrap(), 10);
        assert_eq!(convert("一百十").unwrap(), 110);
    }

    #[test]
    fn test_zero_is_elided_between_weight_groups() {
        assert_eq!(convert("一千零五十").unwrap(), convert("一千五十").unwrap());
        assert_eq!(convert("三百零七").unwrap(), convert("三百七").unwrap());
        assert_eq!(convert("三百零七").unwrap(), 307);
    }

    #[test]
    fn test_trailing_digit_uses_ones_place() {
        // 右起扫描，最后一个权位右侧的数字按个位计
        assert_eq!(convert("一千二百3").unwrap(), 1203);
        assert_eq!(convert("两千").unwrap(), 2000);
    }

    #[test]
    fn test_arabic_and_full_width_digits() {
        assert_eq!(convert("1024").unwrap(), 1024);
        assert_eq!(convert("１２").unwrap(), 12);
        assert_eq!(convert(" 四 五 ").unwrap(), 45);
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(convert(""), Err(NumeralError::Empty));
        assert_eq!(convert("  "), Err(NumeralError::Empty));
        assert!(matches!(
            convert("一万"),
            Err(NumeralError::UnknownSymbol { symbol: '万', .. })
        ));
        assert!(matches!(
            convert("序言"),
            Err(NumeralError::UnknownSymbol { symbol: '序', .. })
        ));
        assert!(matches!(
            convert("九九九九九九九九九九九九九九九九九九九九九"),
            Err(NumeralError::Overflow(_))
        ));
    }
}
