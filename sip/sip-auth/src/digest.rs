use crate::{RequestParts, ResponseParts};
use bytesstr::BytesStr;
use sha2::Digest;
use sip_types::header::HeaderError;
use sip_types::header::typed::{
    Algorithm, AuthChallenge, AuthResponse, AuthenticationInfo, Authorization, DigestChallenge,
    DigestResponse, ProxyAuthenticate, ProxyAuthorization, QopOption, WWWAuthenticate,
};
use sip_types::{CodeKind, Headers, Name};

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("response does not contain a digest challenge")]
    MissingChallenge,
    #[error("realm {0} rejected the credentials")]
    FailedToAuthenticate(BytesStr),
    #[error("encountered unsupported algorithm {0}")]
    UnsupportedAlgorithm(BytesStr),
    #[error("unsupported qop")]
    UnsupportedQop,
    #[error(transparent)]
    Header(#[from] HeaderError),
}

#[derive(Clone)]
pub struct DigestUser {
    user: String,
    password: Vec<u8>,
}

impl DigestUser {
    pub fn new<U, P>(user: U, password: P) -> Self
    where
        U: Into<String>,
        P: Into<Vec<u8>>,
    {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

/// The challenge the next credentials are computed for
struct Challenge {
    is_proxy: bool,
    realm: BytesStr,
    nonce: BytesStr,
    opaque: Option<BytesStr>,
    algorithm: Algorithm,
    qop: Vec<QopOption>,
}

/// Answers digest challenges of a single request attempt.
///
/// Created without a challenge, [`AuthAgent::write_credentials`] does nothing until
/// [`AuthAgent::read_challenge`] saw a 401 or 407 response.
pub struct AuthAgent {
    user: DigestUser,
    challenge: Option<Challenge>,

    /// Nonce count, increments with each credentials written for the same nonce
    nc: u32,

    /// Whether credentials have been written for the current nonce
    used: bool,
}

impl AuthAgent {
    pub fn new(user: DigestUser) -> Self {
        Self {
            user,
            challenge: None,
            nc: 0,
            used: false,
        }
    }

    /// Realm of the last challenge, if any
    pub fn realm(&self) -> Option<&BytesStr> {
        self.challenge.as_ref().map(|c| &c.realm)
    }

    pub fn nonce_count(&self) -> u32 {
        self.nc
    }

    /// Read the challenge of a 401/407 response or the `nextnonce` of a 2xx response.
    ///
    /// Other responses are ignored. Returns an error if a challenge repeats a nonce that was
    /// already answered without being marked as stale, the credentials must be wrong then.
    pub fn read_challenge(&mut self, response: ResponseParts<'_>) -> Result<(), DigestError> {
        match (response.line.code.into_u16(), response.line.code.kind()) {
            (401, _) => {
                let challenges = response.headers.get_named::<Vec<WWWAuthenticate>>()?;
                let challenge = first_digest(challenges.into_iter().map(|h| h.0))?;
                self.set_challenge(false, challenge)
            }
            (407, _) => {
                let challenges = response.headers.get_named::<Vec<ProxyAuthenticate>>()?;
                let challenge = first_digest(challenges.into_iter().map(|h| h.0))?;
                self.set_challenge(true, challenge)
            }
            (_, CodeKind::Success) => {
                self.read_next_nonce(response.headers);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn read_next_nonce(&mut self, headers: &Headers) {
        let info = match headers.try_get_named::<AuthenticationInfo>() {
            Some(Ok(info)) => info,
            Some(Err(e)) => {
                log::warn!("ignoring malformed Authentication-Info, {e}");
                return;
            }
            None => return,
        };

        if let (Some(next_nonce), Some(challenge)) = (info.next_nonce, &mut self.challenge) {
            log::trace!("using next nonce {next_nonce} for realm {}", challenge.realm);

            challenge.nonce = next_nonce;
            self.nc = 0;
            self.used = false;
        }
    }

    fn set_challenge(
        &mut self,
        is_proxy: bool,
        challenge: DigestChallenge,
    ) -> Result<(), DigestError> {
        if let Some(previous) = &self.challenge {
            if self.used && previous.nonce == challenge.nonce && !challenge.stale {
                return Err(DigestError::FailedToAuthenticate(challenge.realm));
            }

            if previous.nonce != challenge.nonce {
                self.nc = 0;
            }
        }

        if let Algorithm::Other(other) = &challenge.algorithm {
            return Err(DigestError::UnsupportedAlgorithm(other.clone()));
        }

        self.used = false;
        self.challenge = Some(Challenge {
            is_proxy,
            realm: challenge.realm,
            nonce: challenge.nonce,
            opaque: challenge.opaque,
            algorithm: challenge.algorithm,
            qop: challenge.qop,
        });

        Ok(())
    }

    /// Write `Authorization` or `Proxy-Authorization` into `headers`, matching the last challenge.
    ///
    /// Does nothing if no challenge has been read yet.
    pub fn write_credentials(
        &mut self,
        request: RequestParts<'_>,
        headers: &mut Headers,
    ) -> Result<(), DigestError> {
        let Some(challenge) = &self.challenge else {
            return Ok(());
        };

        let hash: HashFn = match challenge.algorithm {
            Algorithm::MD5 | Algorithm::MD5Sess => hash_md5,
            Algorithm::SHA256 | Algorithm::SHA256Sess => hash_sha256,
            Algorithm::SHA512256 | Algorithm::SHA512256Sess => hash_sha512_trunc256,
            Algorithm::Other(ref other) => {
                return Err(DigestError::UnsupportedAlgorithm(other.clone()));
            }
        };

        let qop = if challenge.qop.is_empty() {
            None
        } else if challenge.qop.contains(&QopOption::AuthInt) {
            Some(QopOption::AuthInt)
        } else if challenge.qop.contains(&QopOption::Auth) {
            Some(QopOption::Auth)
        } else {
            return Err(DigestError::UnsupportedQop);
        };

        self.nc += 1;
        self.used = true;

        let nc = self.nc;
        let cnonce = BytesStr::from(uuid::Uuid::new_v4().simple().to_string());
        let method = &request.line.method;
        let uri = request.line.uri.as_str();

        let mut ha1 = hash(
            [
                format!("{}:{}:", self.user.user, challenge.realm).as_bytes(),
                &self.user.password,
            ]
            .concat()
            .as_slice(),
        );

        if challenge.algorithm.is_session() {
            ha1 = hash(format!("{ha1}:{}:{cnonce}", challenge.nonce).as_bytes());
        }

        let ha2 = match qop {
            Some(QopOption::AuthInt) => {
                hash(format!("{method}:{uri}:{}", hash(request.body)).as_bytes())
            }
            _ => hash(format!("{method}:{uri}").as_bytes()),
        };

        let (response, qop_response) = match qop {
            Some(qop) => (
                hash(format!("{ha1}:{}:{nc:08x}:{cnonce}:{qop}:{ha2}", challenge.nonce).as_bytes()),
                Some((qop, cnonce, nc)),
            ),
            None => (hash(format!("{ha1}:{}:{ha2}", challenge.nonce).as_bytes()), None),
        };

        let digest = AuthResponse::Digest(DigestResponse {
            username: self.user.user.as_str().into(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.into(),
            response: response.into(),
            algorithm: challenge.algorithm.clone(),
            opaque: challenge.opaque.clone(),
            qop_response,
        });

        if challenge.is_proxy {
            headers.remove(&Name::PROXY_AUTHORIZATION);
            headers.insert_named(&ProxyAuthorization(digest));
        } else {
            headers.remove(&Name::AUTHORIZATION);
            headers.insert_named(&Authorization(digest));
        }

        Ok(())
    }
}

fn first_digest(
    challenges: impl Iterator<Item = AuthChallenge>,
) -> Result<DigestChallenge, DigestError> {
    challenges
        .filter_map(|challenge| match challenge {
            AuthChallenge::Digest(digest) => Some(digest),
            AuthChallenge::Other { scheme, .. } => {
                log::debug!("skipping {scheme} challenge");
                None
            }
        })
        .next()
        .ok_or(DigestError::MissingChallenge)
}

fn hash_md5(i: &[u8]) -> String {
    format!("{:x}", md5::compute(i))
}

fn hash_sha256(i: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(i);
    format!("{:x}", hasher.finalize())
}

fn hash_sha512_trunc256(i: &[u8]) -> String {
    let mut hasher = sha2::Sha512_256::new();
    hasher.update(i);
    format!("{:x}", hasher.finalize())
}

type HashFn = fn(&[u8]) -> String;

#[cfg(test)]
mod test {
    use super::*;
    use sip_types::msg::{RequestLine, StatusLine};
    use sip_types::uri::Uri;
    use sip_types::{Code, Method};

    fn agent() -> AuthAgent {
        AuthAgent::new(DigestUser::new("user123", "password123"))
    }

    fn register_line() -> RequestLine {
        RequestLine {
            method: Method::REGISTER,
            uri: Uri::new("sip:example.org").unwrap(),
        }
    }

    fn challenge_response(code: Code, name: Name, value: &str) -> (StatusLine, Headers) {
        let mut headers = Headers::new();
        headers.insert(name, value.to_owned());

        (StatusLine { code, reason: None }, headers)
    }

    fn read(agent: &mut AuthAgent, response: &(StatusLine, Headers)) -> Result<(), DigestError> {
        agent.read_challenge(ResponseParts {
            line: &response.0,
            headers: &response.1,
        })
    }

    fn write(agent: &mut AuthAgent, line: &RequestLine) -> Headers {
        let mut headers = Headers::new();
        agent
            .write_credentials(RequestParts { line, body: &[] }, &mut headers)
            .unwrap();
        headers
    }

    #[test]
    fn no_challenge_no_credentials() {
        let mut agent = agent();
        let headers = write(&mut agent, &register_line());

        assert!(headers.is_empty());
        assert_eq!(agent.nonce_count(), 0);
    }

    #[test]
    fn digest_without_qop() {
        let mut agent = agent();

        let response = challenge_response(
            Code::UNAUTHORIZED,
            Name::WWW_AUTHENTICATE,
            r#"Digest realm="example.org", nonce="YWmh5GFpoLjiTDCA1hTSSygkgdj99aHE", algorithm=MD5"#,
        );
        read(&mut agent, &response).unwrap();

        let headers = write(&mut agent, &register_line());

        let Authorization(AuthResponse::Digest(digest)) =
            headers.get_named::<Authorization>().unwrap()
        else {
            panic!("expected digest response");
        };

        assert_eq!(digest.username, "user123");
        assert_eq!(digest.realm, "example.org");
        assert_eq!(digest.nonce, "YWmh5GFpoLjiTDCA1hTSSygkgdj99aHE");
        assert_eq!(digest.uri, "sip:example.org");
        assert_eq!(digest.response, "bc185e4893f17f12dc53153d2a62e6a6");
        assert_eq!(digest.qop_response, None);
    }

    #[test]
    fn proxy_challenge_nonce_count_increments() {
        let mut agent = agent();

        let response = challenge_response(
            Code::PROXY_AUTHENTICATION_REQUIRED,
            Name::PROXY_AUTHENTICATE,
            r#"Digest realm="ims.example.org", nonce="abcdef", qop="auth", algorithm=MD5"#,
        );
        read(&mut agent, &response).unwrap();

        let line = RequestLine {
            method: Method::INVITE,
            uri: Uri::new("sip:bob@ims.example.org").unwrap(),
        };

        let first = write(&mut agent, &line);
        let second = write(&mut agent, &line);

        assert!(first.get_named::<Authorization>().is_err());

        let nc = |headers: &Headers| {
            let ProxyAuthorization(AuthResponse::Digest(digest)) =
                headers.get_named::<ProxyAuthorization>().unwrap()
            else {
                panic!("expected digest response");
            };

            let (qop, _, nc) = digest.qop_response.unwrap();
            assert_eq!(qop, QopOption::Auth);
            nc
        };

        assert_eq!(nc(&first), 1);
        assert_eq!(nc(&second), 2);
        assert_eq!(*agent.realm().unwrap(), "ims.example.org");
    }

    #[test]
    fn repeated_nonce_fails() {
        let mut agent = agent();

        let response = challenge_response(
            Code::PROXY_AUTHENTICATION_REQUIRED,
            Name::PROXY_AUTHENTICATE,
            r#"Digest realm="example.org", nonce="n1""#,
        );

        read(&mut agent, &response).unwrap();
        write(&mut agent, &register_line());

        assert!(matches!(
            read(&mut agent, &response),
            Err(DigestError::FailedToAuthenticate(_))
        ));
    }

    #[test]
    fn next_nonce_resets_count() {
        let mut agent = agent();

        let challenge = challenge_response(
            Code::UNAUTHORIZED,
            Name::WWW_AUTHENTICATE,
            r#"Digest realm="example.org", nonce="n1", qop="auth""#,
        );
        read(&mut agent, &challenge).unwrap();
        write(&mut agent, &register_line());
        assert_eq!(agent.nonce_count(), 1);

        let ok = challenge_response(Code::OK, Name::AUTHENTICATION_INFO, r#"nextnonce="n2""#);
        read(&mut agent, &ok).unwrap();
        assert_eq!(agent.nonce_count(), 0);

        let headers = write(&mut agent, &register_line());
        let Authorization(AuthResponse::Digest(digest)) =
            headers.get_named::<Authorization>().unwrap()
        else {
            panic!("expected digest response");
        };

        assert_eq!(digest.nonce, "n2");
        assert_eq!(agent.nonce_count(), 1);
    }

    #[test]
    fn non_digest_challenge() {
        let mut agent = agent();

        let response = challenge_response(
            Code::UNAUTHORIZED,
            Name::WWW_AUTHENTICATE,
            r#"Basic realm="example.org""#,
        );

        assert!(matches!(
            read(&mut agent, &response),
            Err(DigestError::MissingChallenge)
        ));
    }
}
