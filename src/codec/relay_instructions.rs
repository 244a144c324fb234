//! 中继指令编解码
//!
//! 指令顺序拼接，每条以 1 字节类型判别符开头：
//! - 0x01 Gas:        gas_limit u128 ‖ msg_value u128 (33 B)
//! - 0x02 GasDropOff: drop_off u128 ‖ recipient 32 B (49 B)，至多出现一次
//!
//! 汇总规则：Gas 指令逐项累加两个字段；DropOff 的金额计入 msg_value 总和。

use serde::Serialize;

use crate::{
    codec::{CodecError, Reader},
    domain::UniversalAddress,
};

pub const IX_TYPE_GAS: u8 = 1;
pub const IX_TYPE_DROP_OFF: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelayInstruction {
    #[serde(rename = "gas", rename_all = "camelCase")]
    Gas {
        #[serde(with = "string_u128")]
        #[schema(value_type = String)]
        gas_limit: u128,
        #[serde(with = "string_u128")]
        #[schema(value_type = String)]
        msg_value: u128,
    },
    #[serde(rename = "gasDropOff", rename_all = "camelCase")]
    GasDropOff {
        #[serde(with = "string_u128")]
        #[schema(value_type = String)]
        drop_off: u128,
        #[schema(value_type = String)]
        recipient: UniversalAddress,
    },
}

mod string_u128 {
    use serde::{self, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }
}

pub fn encode_relay_instructions(instructions: &[RelayInstruction]) -> Vec<u8> {
    let mut out = Vec::new();
    for ix in instructions {
        match ix {
            RelayInstruction::Gas {
                gas_limit,
                msg_value,
            } => {
                out.push(IX_TYPE_GAS);
                out.extend_from_slice(&gas_limit.to_be_bytes());
                out.extend_from_slice(&msg_value.to_be_bytes());
            }
            RelayInstruction::GasDropOff {
                drop_off,
                recipient,
            } => {
                out.push(IX_TYPE_DROP_OFF);
                out.extend_from_slice(&drop_off.to_be_bytes());
                out.extend_from_slice(recipient.as_bytes());
            }
        }
    }
    out
}

pub fn decode_relay_instructions(bytes: &[u8]) -> Result<Vec<RelayInstruction>, CodecError> {
    let mut r = Reader::new(bytes);
    let mut out = Vec::new();
    let mut has_drop_off = false;
    while r.remaining() > 0 {
        let ix_type = r.u8()?;
        match ix_type {
            IX_TYPE_GAS => out.push(RelayInstruction::Gas {
                gas_limit: r.u128()?,
                msg_value: r.u128()?,
            }),
            IX_TYPE_DROP_OFF => {
                if has_drop_off {
                    return Err(CodecError::DuplicateDropOff);
                }
                has_drop_off = true;
                out.push(RelayInstruction::GasDropOff {
                    drop_off: r.u128()?,
                    recipient: UniversalAddress(r.array::<32>()?),
                });
            }
            other => return Err(CodecError::UnsupportedInstruction(other)),
        }
    }
    Ok(out)
}

/// 汇总 gas 上限与随交易金额
///
/// 指令来自链上事件，u128 累加溢出视为非法输入直接报错。
pub fn total_gas_limit_and_msg_value(
    instructions: &[RelayInstruction],
) -> Result<(u128, u128), CodecError> {
    let mut gas_limit: u128 = 0;
    let mut msg_value: u128 = 0;
    let mut has_drop_off = false;
    for ix in instructions {
        match ix {
            RelayInstruction::Gas {
                gas_limit: g,
                msg_value: v,
            } => {
                gas_limit = gas_limit
                    .checked_add(*g)
                    .ok_or(CodecError::InvalidField("gasLimit overflow"))?;
                msg_value = msg_value
                    .checked_add(*v)
                    .ok_or(CodecError::InvalidField("msgValue overflow"))?;
            }
            RelayInstruction::GasDropOff { drop_off, .. } => {
                if has_drop_off {
                    return Err(CodecError::DuplicateDropOff);
                }
                has_drop_off = true;
                msg_value = msg_value
                    .checked_add(*drop_off)
                    .ok_or(CodecError::InvalidField("msgValue overflow"))?;
            }
        }
    }
    Ok((gas_limit, msg_value))
}
