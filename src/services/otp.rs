use rand::Rng;

/// リセットOTP検証の失敗回数上限
///
/// 上限チェックはインクリメントの前に行うため、
/// カウンタが3に達した次の呼び出しで拒否される（4回目の失敗で429）。
pub const MAX_RESET_ATTEMPTS: i32 = 3;

/// 6桁の数字OTPを生成（100000〜999999の一様乱数）
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    code.to_string()
}
