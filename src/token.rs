use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// トークンの元になる乱数のバイト数（128 bit）。
pub const TOKEN_BYTES: usize = 16;

/// エンコード後のトークン長。
pub const TOKEN_LEN: usize = 22;

/// ロック所有を証明する推測不能なトークンを生成する。
///
/// CSPRNG から 16 バイトを取得し、パディングなしの URL-safe base64 で
/// 22 文字の文字列にエンコードする。
pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
