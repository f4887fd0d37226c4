//! Client side of the SCRAM-SHA-256 exchange (RFC 5802 / RFC 7677).
//!
//! The exchange is a deterministic chain of typestates, so a recorded
//! `(client nonce, server-first, password)` triple fully determines the
//! client proof and the expected server signature.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::errors::{AuthenticationError, Error, ErrorKind};

const NONCE_LENGTH: usize = 18;
const MIN_ITERATIONS: u32 = 4096;

pub(crate) struct ScramClient<'a> {
    user: &'a str,
    password: &'a str,
    nonce: String,
}

pub(crate) struct ServerFirst<'a> {
    password: &'a str,
    client_first_bare: String,
    nonce: String,
}

#[derive(Debug)]
pub(crate) struct ClientFinal {
    message: String,
    server_signature: [u8; 32],
}

pub(crate) struct ServerFinal {
    server_signature: [u8; 32],
}

impl<'a> ScramClient<'a> {
    pub fn new(user: &'a str, password: &'a str, nonce: Option<String>) -> ScramClient<'a> {
        ScramClient {
            user,
            password,
            nonce: nonce.unwrap_or_else(generate_nonce),
        }
    }

    pub fn client_first(self) -> (ServerFirst<'a>, String) {
        let client_first_bare = format!("n={},r={}", escape_name(self.user), self.nonce);
        let message = format!("n,,{}", client_first_bare);
        (
            ServerFirst {
                password: self.password,
                client_first_bare,
                nonce: self.nonce,
            },
            message,
        )
    }
}

impl<'a> ServerFirst<'a> {
    pub fn handle_server_first(self, message: &str) -> Result<ClientFinal, Error> {
        let nonce = field(message, 'r')?;
        if !nonce.starts_with(&self.nonce) {
            return Err(AuthenticationError::with_message(
                "server nonce does not start with the client nonce",
            ));
        }
        let salt = BASE64.decode(field(message, 's')?).map_err(|e| {
            AuthenticationError::with_source(e).context("invalid salt in server-first-message")
        })?;
        let iterations: u32 = field(message, 'i')?.parse().map_err(|e| {
            AuthenticationError::with_source(e)
                .context("invalid iteration count in server-first-message")
        })?;
        if iterations < MIN_ITERATIONS {
            return Err(AuthenticationError::with_message(format!(
                "server requested {} iterations, below the minimum of {}",
                iterations, MIN_ITERATIONS,
            )));
        }

        let salted_password = salted_password(self.password, &salt, iterations);
        let client_key = hmac(&salted_password, b"Client Key");
        let stored_key = sha256(&client_key);
        let client_final_without_proof = format!("c=biws,r={}", nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, message, client_final_without_proof,
        );
        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let mut client_proof = client_key;
        for (b, s) in client_proof.iter_mut().zip(client_signature) {
            *b ^= s;
        }
        let server_key = hmac(&salted_password, b"Server Key");
        let server_signature = hmac(&server_key, auth_message.as_bytes());

        Ok(ClientFinal {
            message: format!(
                "{},p={}",
                client_final_without_proof,
                BASE64.encode(client_proof),
            ),
            server_signature,
        })
    }
}

impl ClientFinal {
    pub fn client_final(self) -> (ServerFinal, String) {
        (
            ServerFinal {
                server_signature: self.server_signature,
            },
            self.message,
        )
    }
}

impl ServerFinal {
    pub fn handle_server_final(self, message: &str) -> Result<(), Error> {
        if let Ok(err) = field(message, 'e') {
            return Err(AuthenticationError::with_message(format!(
                "server rejected authentication: {}",
                err,
            )));
        }
        let verifier = BASE64.decode(field(message, 'v')?).map_err(|e| {
            AuthenticationError::with_source(e).context("invalid server-final-message")
        })?;
        if verifier != self.server_signature {
            return Err(AuthenticationError::with_message(
                "server signature does not match",
            ));
        }
        Ok(())
    }
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LENGTH];
    rand::rng().fill(&mut bytes[..]);
    BASE64.encode(bytes)
}

/// Escape `=` and `,` in the authentication name per RFC 5802
fn escape_name(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

fn field<'x>(message: &'x str, name: char) -> Result<&'x str, Error> {
    message
        .split(',')
        .filter_map(|attr| attr.split_once('='))
        .find(|(key, _)| key.chars().eq(std::iter::once(name)))
        .map(|(_, value)| value)
        .ok_or_else(|| {
            AuthenticationError::with_message(format!(
                "missing attribute {:?} in SCRAM message",
                name,
            ))
        })
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hash = Sha256::new();
    hash.update(data);
    hash.finalize().into()
}

fn salted_password(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod test {
    use super::ScramClient;

    // Recorded exchange from RFC 7677, section 3
    const CLIENT_NONCE: &str = "rOprNGfwEbeRWgbNEkqO";
    const SERVER_FIRST: &str = "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
                                s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";
    const CLIENT_FINAL: &str = "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
                                p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=";
    const SERVER_FINAL: &str = "v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=";

    #[test]
    fn recorded_exchange() {
        let scram = ScramClient::new("user", "pencil", Some(CLIENT_NONCE.into()));
        let (scram, first) = scram.client_first();
        assert_eq!(first, "n,,n=user,r=rOprNGfwEbeRWgbNEkqO");
        let scram = scram.handle_server_first(SERVER_FIRST).unwrap();
        let (scram, final_message) = scram.client_final();
        assert_eq!(final_message, CLIENT_FINAL);
        scram.handle_server_final(SERVER_FINAL).unwrap();
    }

    #[test]
    fn mismatched_server_signature() {
        let scram = ScramClient::new("user", "pencil", Some(CLIENT_NONCE.into()));
        let (scram, _) = scram.client_first();
        let scram = scram.handle_server_first(SERVER_FIRST).unwrap();
        let (scram, _) = scram.client_final();
        let err = scram
            .handle_server_final("v=mE4Rt8nTKYusnVHrAfWb2h1eDRB2da0l0MnOQXTYMD0=")
            .unwrap_err();
        assert!(err.to_string().contains("signature does not match"));
    }

    #[test]
    fn changed_nonce_is_rejected() {
        let scram = ScramClient::new("user", "pencil", Some(CLIENT_NONCE.into()));
        let (scram, _) = scram.client_first();
        let err = scram
            .handle_server_first("r=completely-different,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap_err();
        assert!(err.to_string().contains("nonce"));
    }

    #[test]
    fn low_iteration_count_is_rejected() {
        let scram = ScramClient::new("user", "pencil", Some(CLIENT_NONCE.into()));
        let (scram, _) = scram.client_first();
        let err = scram
            .handle_server_first(
                "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
                 s=W22ZaJ0SNY7soEsUEjb6gQ==,i=1024",
            )
            .unwrap_err();
        assert!(err.to_string().contains("iterations"));
    }

    #[test]
    fn names_are_escaped() {
        let scram = ScramClient::new("a=b,c", "secret", Some("nonce".into()));
        let (_, first) = scram.client_first();
        assert_eq!(first, "n,,n=a=3Db=2Cc,r=nonce");
    }
}
