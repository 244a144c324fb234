//! 报价引擎
//!
//! EQ01 报价的签名/验签与成本估算。签名为 keccak256(报价体) 上的
//! secp256k1 可恢复 ECDSA（r‖s‖v，v ∈ {27,28}，与 EVM ecrecover 兼容）。
//! 估算在 18 位内部精度下做定点运算，中间量用 512 位整数，不会溢出。

use ethers::types::{U256, U512};
use k256::{
    ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::{
    codec::SignedQuote,
    domain::{ChainId, EvmAddress, UniversalAddress},
    utils::hex_utils,
};

/// 报价价格的定点精度（10^-10 USD）
pub const QUOTE_DECIMALS: u32 = 10;
/// 内部运算精度
pub const DECIMAL_RESOLUTION: u32 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("quote expired at {expiry}, now {now}")]
    Expired { expiry: u64, now: u64 },
    #[error("quoter {0} is not in the allowed set")]
    UnknownQuoter(EvmAddress),
    #[error("quote chain mismatch: quote says {quoted}, observed {actual}")]
    ChainMismatch { quoted: u16, actual: u16 },
    #[error("signature does not recover to the quoter address")]
    BadSignature,
    #[error("malformed signature: {0}")]
    MalformedSignature(&'static str),
    #[error("price out of range: {0}")]
    PriceOutOfRange(&'static str),
    #[error("arithmetic overflow in estimate")]
    MathOverflow,
    #[error("invalid quoter key: {0}")]
    InvalidKey(String),
}

/// 从未压缩公钥推导 EVM 地址：keccak256(pubkey[1..])[12..]
fn evm_address_of(key: &VerifyingKey) -> EvmAddress {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    EvmAddress(out)
}

/// 对签名覆盖范围做 keccak 摘要
fn body_digest(body: &[u8]) -> [u8; 32] {
    Keccak256::digest(body).into()
}

/// 从 r‖s‖v 签名恢复签名者地址
pub fn recover_signer(body: &[u8], signature: &[u8; 65]) -> Result<EvmAddress, QuoteError> {
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|_| QuoteError::MalformedSignature("r/s"))?;
    let v = signature[64];
    let recovery = RecoveryId::from_byte(v.checked_sub(27).unwrap_or(v))
        .ok_or(QuoteError::MalformedSignature("v"))?;
    let key = VerifyingKey::recover_from_prehash(&body_digest(body), &sig, recovery)
        .map_err(|_| QuoteError::BadSignature)?;
    Ok(evm_address_of(&key))
}

/// 报价引擎：持有报价方私钥与可信报价方集合
pub struct QuoteEngine {
    signing_key: SigningKey,
    quoter_address: EvmAddress,
    allowed_quoters: Vec<EvmAddress>,
}

impl QuoteEngine {
    /// 从十六进制私钥创建；`extra_allowed` 在自身地址之外额外信任的报价方
    pub fn new(private_key_hex: &str, extra_allowed: &[EvmAddress]) -> Result<Self, QuoteError> {
        let key_bytes = hex_utils::decode(private_key_hex)
            .map_err(|e| QuoteError::InvalidKey(e.to_string()))?;
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| QuoteError::InvalidKey(e.to_string()))?;
        let quoter_address = evm_address_of(signing_key.verifying_key());
        let mut allowed_quoters = vec![quoter_address];
        for addr in extra_allowed {
            if !allowed_quoters.contains(addr) {
                allowed_quoters.push(*addr);
            }
        }
        Ok(Self {
            signing_key,
            quoter_address,
            allowed_quoters,
        })
    }

    pub fn quoter_address(&self) -> EvmAddress {
        self.quoter_address
    }

    pub fn allowed_quoters(&self) -> &[EvmAddress] {
        &self.allowed_quoters
    }

    /// 对报价体签名，返回 65 字节 r‖s‖v
    pub fn sign_body(&self, body: &[u8]) -> Result<[u8; 65], QuoteError> {
        let (sig, recovery) = self
            .signing_key
            .sign_prehash_recoverable(&body_digest(body))
            .map_err(|_| QuoteError::BadSignature)?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = 27 + recovery.to_byte();
        Ok(out)
    }

    /// 构造并签发一张报价
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        &self,
        payee_address: UniversalAddress,
        src_chain: ChainId,
        dst_chain: ChainId,
        expiry_time: u64,
        base_fee: u64,
        dst_gas_price: u64,
        src_price: u64,
        dst_price: u64,
    ) -> Result<SignedQuote, QuoteError> {
        if src_price == 0 {
            return Err(QuoteError::PriceOutOfRange("srcPrice must be positive"));
        }
        if dst_price == 0 {
            return Err(QuoteError::PriceOutOfRange("dstPrice must be positive"));
        }
        let mut quote = SignedQuote {
            quoter_address: self.quoter_address,
            payee_address,
            src_chain,
            dst_chain,
            expiry_time,
            base_fee,
            dst_gas_price,
            src_price,
            dst_price,
            signature: [0u8; 65],
        };
        quote.signature = self.sign_body(&quote.body_bytes())?;
        Ok(quote)
    }

    /// 验签：报价方可信、未过期、签名恢复地址与 quoterAddress 一致
    pub fn verify(&self, quote: &SignedQuote, now: u64) -> Result<(), QuoteError> {
        if !self.allowed_quoters.contains(&quote.quoter_address) {
            return Err(QuoteError::UnknownQuoter(quote.quoter_address));
        }
        if quote.expiry_time <= now {
            return Err(QuoteError::Expired {
                expiry: quote.expiry_time,
                now,
            });
        }
        if quote.src_price == 0 || quote.dst_price == 0 {
            return Err(QuoteError::PriceOutOfRange("prices must be positive"));
        }
        let recovered = recover_signer(&quote.body_bytes(), &quote.signature)?;
        if recovered != quote.quoter_address {
            return Err(QuoteError::BadSignature);
        }
        Ok(())
    }
}

fn pow10(exp: u32) -> Option<U512> {
    U512::from(10u8).checked_pow(U512::from(exp))
}

/// 在十进制精度之间换算：from > to 截断除，from < to 乘
fn normalize(x: U512, from: u32, to: u32) -> Option<U512> {
    if from > to {
        x.checked_div(pow10(from - to)?)
    } else if from < to {
        x.checked_mul(pow10(to - from)?)
    } else {
        Some(x)
    }
}

fn to_u256(x: U512) -> Option<U256> {
    let limbs = x.0;
    if limbs[4..].iter().any(|l| *l != 0) {
        return None;
    }
    Some(U256([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// 按报价估算一次执行在源链上的成本（源链原生最小单位）
///
/// gas 项与 msgValue 项先换算到 18 位内部精度，经 dst/src 价格比折算为
/// 源链价值，再落到源链原生精度；base fee 从 10 位报价精度直接落到源链精度。
pub fn estimate(
    quote: &SignedQuote,
    gas_limit: u128,
    msg_value: u128,
    dst_gas_price_decimals: u8,
    src_native_decimals: u8,
    dst_native_decimals: u8,
) -> Result<U256, QuoteError> {
    if quote.src_price == 0 {
        return Err(QuoteError::PriceOutOfRange("srcPrice must be positive"));
    }
    if quote.dst_price == 0 {
        return Err(QuoteError::PriceOutOfRange("dstPrice must be positive"));
    }
    let gas_cost = U512::from(gas_limit)
        .checked_mul(U512::from(quote.dst_gas_price))
        .ok_or(QuoteError::MathOverflow)?;
    let n_gas = normalize(gas_cost, dst_gas_price_decimals as u32, DECIMAL_RESOLUTION)
        .ok_or(QuoteError::MathOverflow)?;

    let n_src = normalize(
        U512::from(quote.src_price),
        QUOTE_DECIMALS,
        DECIMAL_RESOLUTION,
    )
    .ok_or(QuoteError::MathOverflow)?;
    let n_dst = normalize(
        U512::from(quote.dst_price),
        QUOTE_DECIMALS,
        DECIMAL_RESOLUTION,
    )
    .ok_or(QuoteError::MathOverflow)?;
    let resolution_scale = pow10(DECIMAL_RESOLUTION).ok_or(QuoteError::MathOverflow)?;
    let conversion = n_dst
        .checked_mul(resolution_scale)
        .and_then(|x| x.checked_div(n_src))
        .ok_or(QuoteError::MathOverflow)?;

    let n_value = normalize(
        U512::from(msg_value),
        dst_native_decimals as u32,
        DECIMAL_RESOLUTION,
    )
    .ok_or(QuoteError::MathOverflow)?;

    let gas_term = n_gas
        .checked_mul(conversion)
        .and_then(|x| x.checked_div(resolution_scale))
        .ok_or(QuoteError::MathOverflow)?;
    let value_term = n_value
        .checked_mul(conversion)
        .and_then(|x| x.checked_div(resolution_scale))
        .ok_or(QuoteError::MathOverflow)?;

    let variable = normalize(
        gas_term.checked_add(value_term).ok_or(QuoteError::MathOverflow)?,
        DECIMAL_RESOLUTION,
        src_native_decimals as u32,
    )
    .ok_or(QuoteError::MathOverflow)?;
    let base = normalize(
        U512::from(quote.base_fee),
        QUOTE_DECIMALS,
        src_native_decimals as u32,
    )
    .ok_or(QuoteError::MathOverflow)?;

    let total = variable.checked_add(base).ok_or(QuoteError::MathOverflow)?;
    to_u256(total).ok_or(QuoteError::MathOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn engine() -> QuoteEngine {
        QuoteEngine::new(TEST_KEY, &[]).unwrap()
    }

    fn sample_quote(engine: &QuoteEngine) -> SignedQuote {
        engine
            .issue(
                EvmAddress([0x22; 20]).to_universal(),
                1,
                2,
                crate::utils::time_utils::current_timestamp_u64() + 3600,
                100,
                200,
                300,
                400,
            )
            .unwrap()
    }

    #[test]
    fn sign_verify_round_trip() {
        let engine = engine();
        let quote = sample_quote(&engine);
        let now = crate::utils::time_utils::current_timestamp_u64();
        assert!(engine.verify(&quote, now).is_ok());

        // 序列化形式 = 报价体 ‖ 签名
        let bytes = quote.encode();
        assert_eq!(&bytes[..108], quote.body_bytes().as_slice());
        assert_eq!(&bytes[108..], &quote.signature);
    }

    #[test]
    fn tampered_body_fails_verification() {
        let engine = engine();
        let mut quote = sample_quote(&engine);
        quote.base_fee += 1;
        let now = crate::utils::time_utils::current_timestamp_u64();
        assert_eq!(engine.verify(&quote, now), Err(QuoteError::BadSignature));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let engine = engine();
        let mut quote = sample_quote(&engine);
        quote.signature[10] ^= 0x01;
        let now = crate::utils::time_utils::current_timestamp_u64();
        assert!(engine.verify(&quote, now).is_err());
    }

    #[test]
    fn unknown_quoter_rejected() {
        let engine = engine();
        let other = QuoteEngine::new(
            "6c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
            &[],
        )
        .unwrap();
        let quote = sample_quote(&other);
        let now = crate::utils::time_utils::current_timestamp_u64();
        assert!(matches!(
            engine.verify(&quote, now),
            Err(QuoteError::UnknownQuoter(_))
        ));
    }

    #[test]
    fn expired_quote_rejected() {
        let engine = engine();
        let mut quote = sample_quote(&engine);
        quote.expiry_time = 10;
        quote.signature = engine.sign_body(&quote.body_bytes()).unwrap();
        let now = crate::utils::time_utils::current_timestamp_u64();
        assert!(matches!(
            engine.verify(&quote, now),
            Err(QuoteError::Expired { .. })
        ));
    }

    fn bare_quote(base_fee: u64) -> SignedQuote {
        SignedQuote {
            quoter_address: EvmAddress([0x11; 20]),
            payee_address: EvmAddress([0x22; 20]).to_universal(),
            src_chain: 1,
            dst_chain: 2,
            expiry_time: 0,
            base_fee,
            dst_gas_price: 200,
            src_price: 300,
            dst_price: 400,
            signature: [0; 65],
        }
    }

    #[test]
    fn estimate_variable_part() {
        // gasLimit=1000, dstGasPrice=200, srcPrice=300, dstPrice=400, 全部 18 位精度
        // 变动部分 = floor(1000*200 * (400/300)) = 266666
        let est = estimate(&bare_quote(0), 1000, 0, 18, 18, 18).unwrap();
        assert_eq!(est, U256::from(266_666u64));
        // gasLimit 翻倍
        let est2 = estimate(&bare_quote(0), 2000, 0, 18, 18, 18).unwrap();
        assert_eq!(est2, U256::from(533_333u64));
    }

    #[test]
    fn estimate_includes_base_fee() {
        // base fee 100 @ 10 位精度 → 100 * 10^8 = 10^10 源链最小单位
        let est = estimate(&bare_quote(100), 1000, 0, 18, 18, 18).unwrap();
        assert_eq!(est, U256::from(10_000_266_666u64));
    }

    #[test]
    fn estimate_matches_onchain_reference() {
        // 链上报价程序的参考用例 (ETH -> SOL)
        let quote = SignedQuote {
            base_fee: 100,
            src_price: 2_650_000_000,
            dst_price: 160_000_000,
            dst_gas_price: 399_146,
            ..bare_quote(0)
        };
        let est = estimate(&quote, 250_000, 0, 15, 18, 18).unwrap();
        assert_eq!(est, U256::from(6_034_845_283_018u64));
    }

    #[test]
    fn estimate_monotonic() {
        let base = estimate(&bare_quote(100), 1000, 500, 18, 18, 18).unwrap();
        assert!(estimate(&bare_quote(100), 2000, 500, 18, 18, 18).unwrap() >= base);
        assert!(estimate(&bare_quote(100), 1000, 900, 18, 18, 18).unwrap() >= base);
        assert!(estimate(&bare_quote(200), 1000, 500, 18, 18, 18).unwrap() >= base);
        let mut cheaper_src = bare_quote(100);
        cheaper_src.src_price = 600;
        assert!(estimate(&cheaper_src, 1000, 500, 18, 18, 18).unwrap() <= base);
    }

    #[test]
    fn random_keys_round_trip() {
        for _ in 0..8 {
            let key = SigningKey::random(&mut rand::thread_rng());
            let engine = QuoteEngine::new(&hex::encode(key.to_bytes()), &[]).unwrap();
            let quote = sample_quote(&engine);
            let now = crate::utils::time_utils::current_timestamp_u64();
            assert!(engine.verify(&quote, now).is_ok());
            assert_eq!(
                recover_signer(&quote.body_bytes(), &quote.signature).unwrap(),
                engine.quoter_address()
            );
        }
    }

    #[test]
    fn estimate_zero_src_price_fails() {
        let mut quote = bare_quote(100);
        quote.src_price = 0;
        assert!(matches!(
            estimate(&quote, 1000, 0, 18, 18, 18),
            Err(QuoteError::PriceOutOfRange(_))
        ));
    }
}
