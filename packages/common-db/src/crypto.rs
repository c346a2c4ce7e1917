//! Módulo de credenciais do paciente
//!
//! Este módulo implementa o hash do PIN (argon2id com salt aleatório e
//! verificação em tempo constante) e a geração/hash dos tokens opacos de
//! sessão (HMAC-SHA256 com segredo do servidor).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use sha2::Sha256;
use std::fmt::Write;
use zeroize::Zeroizing;

use crate::error::DbError;

type HmacSha256 = Hmac<Sha256>;

/// Tamanho do token opaco de sessão em caracteres
pub const SESSION_TOKEN_LEN: usize = 48;

/// PIN em memória, zerado ao sair de escopo
pub type Pin = Zeroizing<String>;

/// Gera o hash argon2id (formato PHC) de um PIN
pub fn hash_pin(pin: &str) -> Result<String, DbError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbError::CredentialError(format!("Falha ao gerar hash do PIN: {}", e)))
}

/// Verifica um PIN contra o hash armazenado
///
/// Retorna `Ok(false)` para PIN incorreto; erro apenas para hash corrompido.
pub fn verify_pin(pin: &str, stored_hash: &str) -> Result<bool, DbError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| DbError::CredentialError(format!("Hash de PIN inválido: {}", e)))?;

    match Argon2::default().verify_password(pin.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::CredentialError(format!("Falha ao verificar PIN: {}", e))),
    }
}

/// Gera um token de sessão aleatório
pub fn generate_session_token() -> Zeroizing<String> {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect();
    Zeroizing::new(token)
}

/// Calcula o hash (hex) de um token de sessão com o segredo do servidor
pub fn hash_session_token(token: &str, secret: &[u8]) -> Result<String, DbError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| DbError::CredentialError(format!("Segredo de sessão inválido: {}", e)))?;
    mac.update(token.as_bytes());
    let digest = mac.finalize().into_bytes();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    Ok(hex)
}
