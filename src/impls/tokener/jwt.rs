use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::core::tokener::{Payload, Tokener};
use crate::error::Error;

pub struct JWT {
    secret: Vec<u8>,
}

impl JWT {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<P> Tokener<P> for JWT
where
    P: Payload,
{
    fn gen_token(&self, payload: &P) -> Result<String, Error> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(&self.secret);
        let token = encode(&header, payload, &key)?;
        Ok(token)
    }

    fn verify_token(&self, token: &str) -> Result<P, Error> {
        let key = DecodingKey::from_secret(&self.secret);
        let validation = Validation::new(Algorithm::HS256);
        let payload = decode(token, &key, &validation)?;
        Ok(payload.claims)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::tokener::Claim;

    #[test]
    fn test_gen_and_verify_token() {
        let jwt = JWT::new(b"0123456789".to_vec());
        let claim = Claim::for_user(42);
        let token = jwt.gen_token(&claim).unwrap();
        let decoded: Claim = jwt.verify_token(&token).unwrap();
        assert_eq!(decoded.user, "42");
    }

    #[test]
    fn test_different_tokens() {
        let jwt = JWT::new(b"0123456789".to_vec());
        let token_a = jwt.gen_token(&Claim::for_user(1)).unwrap();
        let token_b = jwt.gen_token(&Claim::for_user(2)).unwrap();
        assert_ne!(token_a, token_b);
        let a: Claim = jwt.verify_token(&token_a).unwrap();
        let b: Claim = jwt.verify_token(&token_b).unwrap();
        assert_eq!(a.user, "1");
        assert_eq!(b.user, "2");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = JWT::new(b"0123456789".to_vec());
        let claim = Claim {
            user: "7".into(),
            exp: chrono::Utc::now().timestamp() - 3600,
        };
        let token = jwt.gen_token(&claim).unwrap();
        assert!(<JWT as Tokener<Claim>>::verify_token(&jwt, &token).is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let jwt = JWT::new(b"0123456789".to_vec());
        let other = JWT::new(b"abcdefghij".to_vec());
        let token = jwt.gen_token(&Claim::for_user(3)).unwrap();
        assert!(<JWT as Tokener<Claim>>::verify_token(&other, &token).is_err());
    }
}
