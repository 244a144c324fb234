//! 十六进制处理工具
//!
//! 所有来自外部边界的十六进制输入（请求ID、报价字节、地址）先在这里
//! 统一规范化（去掉 0x 前缀、转小写），避免大小写/前缀差异造成重复条目。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Invalid(#[from] hex::FromHexError),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// 去掉 0x/0X 前缀并转小写
pub fn normalize(input: &str) -> String {
    let trimmed = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    trimmed.to_ascii_lowercase()
}

/// 解码任意长度十六进制（容忍 0x 前缀与大小写）
pub fn decode(input: &str) -> Result<Vec<u8>, HexError> {
    Ok(hex::decode(normalize(input))?)
}

/// 解码定长十六进制
pub fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], HexError> {
    let bytes = decode(input)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| HexError::Length {
        expected: N,
        actual,
    })
}

/// 编码为带 0x 前缀的小写十六进制
pub fn encode_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_prefix_and_case() {
        assert_eq!(normalize("0xAbCd"), "abcd");
        assert_eq!(normalize("0XABCD"), "abcd");
        assert_eq!(normalize("abcd"), "abcd");
    }

    #[test]
    fn fixed_length_enforced() {
        assert!(decode_fixed::<2>("0xabcd").is_ok());
        assert!(matches!(
            decode_fixed::<4>("0xabcd"),
            Err(HexError::Length {
                expected: 4,
                actual: 2
            })
        ));
    }
}
