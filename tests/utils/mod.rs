//! In-memory `Provider` implementation shared by the integration tests.

#![allow(dead_code)]

pub mod wallet;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use serde_json::json;

use vc_gateway::cache::{DocumentCache, EphemeralKeys, ReplayCache};
use vc_gateway::document::{CompleteDocument, DocumentMeta, Identity};
use vc_gateway::jose::jws::SigningMaterial;
use vc_gateway::oid4vci::issuer::metadata::read_metadata;
use vc_gateway::oid4vci::types::{
    AuthMethod, CredentialConstructor, CredentialOffer, GatewayConfig, IssuerMetadata,
    OauthClient, ServerMetadata, User,
};
use vc_gateway::provider::{
    Caches, ContextStore, CredentialSigner, CredentialSubjectRecord, DocumentStore, MdocSignRequest,
    Metadata, OfferStore, SdJwtSignRequest, SdJwtSigned, Signer, StatusAllocation,
    StatusListClient, UserStore,
};
use vc_gateway::sd_jwt::Disclosure;
use vc_gateway::state::{AuthorizationContext, TokenInfo};
use vc_gateway::status::InitialStatus;
use vc_gateway::vctm::{Vctm, VctmClaim};

pub const CREDENTIAL_ISSUER: &str = "https://issuer.example.com";
pub const WALLET_CLIENT: &str = "wallet-a";
pub const WALLET_REDIRECT: &str = "https://wallet.example.com/cb";
pub const NORMAL_USER: &str = "john.doe";
pub const USER_PASSWORD: &str = "correct horse battery staple";
pub const EHIC_SOURCE: &str = "EHIC:00001";
pub const PDA1_SOURCE: &str = "PDA1:00001";

pub const SIGNING_KEY_PEM: &[u8] = include_bytes!("../fixtures/issuer-key.pem");
pub const SIGNING_CHAIN_PEM: &[u8] = include_bytes!("../fixtures/issuer-cert.pem");
pub const SIGNING_PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/issuer-pub.pem");

/// The identity all test fixtures are bound to.
pub fn identity() -> Identity {
    Identity {
        given_name: "John".to_string(),
        family_name: "Doe".to_string(),
        birth_date: "1990-01-01".to_string(),
    }
}

fn ehic_document() -> CompleteDocument {
    CompleteDocument {
        meta: DocumentMeta {
            authentic_source: EHIC_SOURCE.to_string(),
            document_type: "urn:eudi:ehic:1".to_string(),
            document_id: "ehic-123".to_string(),
        },
        identities: vec![identity()],
        document_display: None,
        document_data: json!({
            "subject": {
                "given_name": "John",
                "family_name": "Doe",
                "birth_date": "1990-01-01"
            },
            "social_security_pin": "12345",
            "period_entitlement": {"ending_date": "2026-12-31"}
        }),
        document_data_version: "1.0.0".to_string(),
        qr: None,
    }
}

fn pda1_document() -> CompleteDocument {
    CompleteDocument {
        meta: DocumentMeta {
            authentic_source: PDA1_SOURCE.to_string(),
            document_type: "urn:eudi:pda1:1".to_string(),
            document_id: "pda1-456".to_string(),
        },
        identities: vec![identity()],
        document_display: None,
        document_data: json!({
            "subject": {
                "given_name": "John",
                "family_name": "Doe",
                "birth_date": "1990-01-01"
            },
            "places_of_work": ["SE", "DK"],
            "decision_legislation_applicable": {"ending_date": "2027-06-30"}
        }),
        document_data_version: "1.0.0".to_string(),
        qr: None,
    }
}

fn ehic_vctm() -> Vctm {
    Vctm {
        vct: "urn:eudi:ehic:1".to_string(),
        name: Some("European Health Insurance Card".to_string()),
        description: None,
        claims: vec![
            VctmClaim {
                path: "$.subject.given_name".to_string(),
                svg_id: "given_name".to_string(),
                label: "Given name".to_string(),
            },
            VctmClaim {
                path: "$.subject.family_name".to_string(),
                svg_id: "family_name".to_string(),
                label: "Family name".to_string(),
            },
            VctmClaim {
                path: "$.social_security_pin".to_string(),
                svg_id: "pin".to_string(),
                label: "Social security PIN".to_string(),
            },
        ],
    }
}

fn pda1_vctm() -> Vctm {
    Vctm {
        vct: "urn:eudi:pda1:1".to_string(),
        name: Some("PDA1".to_string()),
        description: None,
        claims: vec![VctmClaim {
            path: "$.subject.given_name".to_string(),
            svg_id: "given_name".to_string(),
            label: "Given name".to_string(),
        }],
    }
}

struct Inner {
    config: GatewayConfig,
    issuer_metadata: IssuerMetadata,
    server_metadata: ServerMetadata,
    clients: HashMap<String, OauthClient>,
    constructors: HashMap<String, CredentialConstructor>,
    users: HashMap<String, User>,
    documents: Vec<CompleteDocument>,
    contexts: Mutex<HashMap<String, AuthorizationContext>>,
    offers: Mutex<HashMap<String, CredentialOffer>>,
    allocated: Mutex<Vec<InitialStatus>>,
    registered: Mutex<Vec<CredentialSubjectRecord>>,
    signing: SigningMaterial,
    ephemeral_keys: EphemeralKeys,
    document_cache: DocumentCache,
    replay_cache: ReplayCache,
}

/// In-memory provider backing the integration tests.
#[derive(Clone)]
pub struct ProviderImpl(Arc<Inner>);

impl ProviderImpl {
    pub fn new() -> Self {
        let issuer_metadata: IssuerMetadata = serde_json::from_value(
            read_metadata(Path::new("tests/fixtures/issuer-metadata.json"))
                .expect("issuer metadata should read"),
        )
        .expect("issuer metadata should parse");
        let server_metadata: ServerMetadata = serde_json::from_value(
            read_metadata(Path::new("tests/fixtures/oauth-server-metadata.yaml"))
                .expect("server metadata should read"),
        )
        .expect("server metadata should parse");

        let config = GatewayConfig {
            credential_issuer: CREDENTIAL_ISSUER.to_string(),
            token_endpoint: format!("{CREDENTIAL_ISSUER}/oauth/token"),
            credential_endpoint: format!("{CREDENTIAL_ISSUER}/credential"),
            consent_endpoint: format!("{CREDENTIAL_ISSUER}/authorization/consent"),
            consent_callback_endpoint: format!(
                "{CREDENTIAL_ISSUER}/authorization/consent/callback"
            ),
            request_object_endpoint: format!("{CREDENTIAL_ISSUER}/verification/request-object"),
            response_endpoint: format!("{CREDENTIAL_ISSUER}/verification/direct_post"),
            wallet_url: "openid4vp://authorize".to_string(),
            verifier_client_id: "x509_san_dns:issuer.example.com".to_string(),
            registry_external_url: "https://registry.example.com".to_string(),
        };

        let clients = HashMap::from([(
            WALLET_CLIENT.to_string(),
            OauthClient {
                redirect_uris: vec![WALLET_REDIRECT.to_string()],
                scopes: vec![
                    "ehic_1".to_string(),
                    "ehic_mdoc".to_string(),
                    "pda1_1".to_string(),
                ],
                allow_san_dns: false,
            },
        )]);

        let constructors = HashMap::from([
            (
                "ehic_1".to_string(),
                CredentialConstructor {
                    vct: "urn:eudi:ehic:1".to_string(),
                    vctm: ehic_vctm(),
                    auth_method: AuthMethod::Basic,
                },
            ),
            (
                "ehic_mdoc".to_string(),
                CredentialConstructor {
                    vct: "urn:eudi:ehic:1".to_string(),
                    vctm: ehic_vctm(),
                    auth_method: AuthMethod::Basic,
                },
            ),
            (
                "pda1_1".to_string(),
                CredentialConstructor {
                    vct: "urn:eudi:pda1:1".to_string(),
                    vctm: pda1_vctm(),
                    auth_method: AuthMethod::PidAuth,
                },
            ),
        ]);

        let users = HashMap::from([(
            NORMAL_USER.to_string(),
            User {
                username: NORMAL_USER.to_string(),
                password_hash: bcrypt::hash(USER_PASSWORD, 4).expect("should hash"),
                identity: identity(),
                vct: "urn:eudi:ehic:1".to_string(),
                authentic_source: EHIC_SOURCE.to_string(),
            },
        )]);

        let signing = SigningMaterial::from_pem(SIGNING_KEY_PEM, SIGNING_CHAIN_PEM)
            .expect("signing material should load");

        Self(Arc::new(Inner {
            config,
            issuer_metadata,
            server_metadata,
            clients,
            constructors,
            users,
            documents: vec![ehic_document(), pda1_document()],
            contexts: Mutex::new(HashMap::new()),
            offers: Mutex::new(HashMap::new()),
            allocated: Mutex::new(vec![]),
            registered: Mutex::new(vec![]),
            signing,
            ephemeral_keys: EphemeralKeys::new(),
            document_cache: DocumentCache::new(),
            replay_cache: ReplayCache::new(),
        }))
    }

    /// The context for a session, for white-box assertions.
    pub fn context_by_session(&self, session_id: &str) -> Option<AuthorizationContext> {
        self.0.contexts.lock().expect("should lock").get(session_id).cloned()
    }

    /// Force a session's pushed request to be expired.
    pub fn expire_session(&self, session_id: &str) {
        let mut contexts = self.0.contexts.lock().expect("should lock");
        if let Some(context) = contexts.get_mut(session_id) {
            context.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    /// Initial statuses allocated through the status-list client.
    pub fn allocated(&self) -> Vec<InitialStatus> {
        self.0.allocated.lock().expect("should lock").clone()
    }

    /// Credential-subject records registered after issuance.
    pub fn registered(&self) -> Vec<CredentialSubjectRecord> {
        self.0.registered.lock().expect("should lock").clone()
    }
}

impl Default for ProviderImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl Metadata for ProviderImpl {
    async fn gateway(&self) -> Result<GatewayConfig> {
        Ok(self.0.config.clone())
    }

    async fn issuer(&self) -> Result<IssuerMetadata> {
        Ok(self.0.issuer_metadata.clone())
    }

    async fn server(&self) -> Result<ServerMetadata> {
        Ok(self.0.server_metadata.clone())
    }

    async fn client(&self, client_id: &str) -> Result<OauthClient> {
        self.0.clients.get(client_id).cloned().ok_or_else(|| anyhow!("client not found"))
    }

    async fn constructor(&self, scope: &str) -> Result<CredentialConstructor> {
        self.0
            .constructors
            .get(scope)
            .cloned()
            .ok_or_else(|| anyhow!("no constructor for scope: {scope}"))
    }
}

impl ContextStore for ProviderImpl {
    async fn put(&self, context: &AuthorizationContext) -> Result<()> {
        let mut contexts = self.0.contexts.lock().expect("should lock");
        if contexts.contains_key(&context.session_id) {
            return Err(anyhow!("duplicate session_id"));
        }
        contexts.insert(context.session_id.clone(), context.clone());
        Ok(())
    }

    async fn by_request_uri(&self, request_uri: &str) -> Result<Option<AuthorizationContext>> {
        let contexts = self.0.contexts.lock().expect("should lock");
        Ok(contexts.values().find(|c| c.request_uri == request_uri).cloned())
    }

    async fn by_session(&self, session_id: &str) -> Result<Option<AuthorizationContext>> {
        Ok(self.0.contexts.lock().expect("should lock").get(session_id).cloned())
    }

    async fn by_access_token(&self, access_token: &str) -> Result<Option<AuthorizationContext>> {
        let contexts = self.0.contexts.lock().expect("should lock");
        Ok(contexts
            .values()
            .find(|c| c.token.as_ref().is_some_and(|t| t.access_token == access_token))
            .cloned())
    }

    async fn by_verifier_response_code(&self, code: &str) -> Result<Option<AuthorizationContext>> {
        let contexts = self.0.contexts.lock().expect("should lock");
        Ok(contexts.values().find(|c| c.verifier_response_code == code).cloned())
    }

    async fn by_encryption_key(&self, key_id: &str) -> Result<Option<AuthorizationContext>> {
        let contexts = self.0.contexts.lock().expect("should lock");
        Ok(contexts.values().find(|c| c.ephemeral_encryption_key_id == key_id).cloned())
    }

    async fn forfeit_code(&self, code: &str) -> Result<Option<AuthorizationContext>> {
        // find-and-mark-used under a single lock
        let mut contexts = self.0.contexts.lock().expect("should lock");
        let Some(context) = contexts.values_mut().find(|c| c.code == code && !c.is_used) else {
            return Ok(None);
        };
        let snapshot = context.clone();
        context.is_used = true;
        Ok(Some(snapshot))
    }

    async fn add_token(&self, session_id: &str, token: &TokenInfo) -> Result<()> {
        let mut contexts = self.0.contexts.lock().expect("should lock");
        let context = contexts.get_mut(session_id).ok_or_else(|| anyhow!("unknown session"))?;
        if context.token.is_some() {
            return Err(anyhow!("token already issued"));
        }
        context.token = Some(token.clone());
        Ok(())
    }

    async fn set_consent(&self, session_id: &str) -> Result<()> {
        let mut contexts = self.0.contexts.lock().expect("should lock");
        let context = contexts.get_mut(session_id).ok_or_else(|| anyhow!("unknown session"))?;
        context.consent = true;
        Ok(())
    }

    async fn add_identity(&self, session_id: &str, identity: &Identity) -> Result<()> {
        let mut contexts = self.0.contexts.lock().expect("should lock");
        let context = contexts.get_mut(session_id).ok_or_else(|| anyhow!("unknown session"))?;
        context.identity = Some(identity.clone());
        Ok(())
    }

    async fn set_authentic_source(&self, session_id: &str, authentic_source: &str) -> Result<()> {
        let mut contexts = self.0.contexts.lock().expect("should lock");
        let context = contexts.get_mut(session_id).ok_or_else(|| anyhow!("unknown session"))?;
        context.authentic_source = Some(authentic_source.to_string());
        Ok(())
    }
}

impl UserStore for ProviderImpl {
    async fn user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.0.users.get(username).cloned())
    }
}

impl OfferStore for ProviderImpl {
    async fn put_offer(&self, offer: &CredentialOffer) -> Result<()> {
        let mut offers = self.0.offers.lock().expect("should lock");
        if offers.contains_key(&offer.id) {
            return Err(anyhow!("duplicate offer id"));
        }
        offers.insert(offer.id.clone(), offer.clone());
        Ok(())
    }

    async fn offer(&self, id: &str) -> Result<Option<CredentialOffer>> {
        Ok(self.0.offers.lock().expect("should lock").get(id).cloned())
    }

    async fn purge_offer(&self, id: &str) -> Result<()> {
        self.0.offers.lock().expect("should lock").remove(id);
        Ok(())
    }
}

impl DocumentStore for ProviderImpl {
    async fn document(
        &self, authentic_source: &str, document_type: &str, identity: &Identity,
    ) -> Result<Option<CompleteDocument>> {
        Ok(self
            .0
            .documents
            .iter()
            .find(|d| {
                d.meta.authentic_source == authentic_source
                    && d.meta.document_type == document_type
                    && d.bound_to(identity)
            })
            .cloned())
    }

    async fn documents_for_identity(
        &self, document_type: &str, identity: &Identity,
    ) -> Result<HashMap<String, CompleteDocument>> {
        Ok(self
            .0
            .documents
            .iter()
            .filter(|d| d.meta.document_type == document_type && d.bound_to(identity))
            .map(|d| (d.meta.authentic_source.clone(), d.clone()))
            .collect())
    }
}

impl StatusListClient for ProviderImpl {
    async fn allocate(&self, status: InitialStatus) -> Result<StatusAllocation> {
        let mut allocated = self.0.allocated.lock().expect("should lock");
        allocated.push(status);
        Ok(StatusAllocation { section: 3, index: allocated.len() as i64 - 1 })
    }

    async fn register(&self, record: &CredentialSubjectRecord) -> Result<()> {
        self.0.registered.lock().expect("should lock").push(record.clone());
        Ok(())
    }
}

impl CredentialSigner for ProviderImpl {
    async fn sign_sd_jwt(&self, request: &SdJwtSignRequest) -> Result<SdJwtSigned> {
        let jwt = wallet::sign_sd_jwt_stub(request)?;

        let mut credential = jwt;
        if let serde_json::Value::Object(subject) =
            request.document_data.get("subject").cloned().unwrap_or_default()
        {
            for (name, value) in subject {
                credential.push('~');
                credential.push_str(&Disclosure::new(name, value).encoded()?);
            }
        }
        credential.push('~');

        let allocation = StatusListClient::allocate(self, InitialStatus::Valid).await?;
        Ok(SdJwtSigned {
            credentials: vec![credential],
            section: allocation.section,
            index: allocation.index,
        })
    }

    async fn sign_mdoc(&self, request: &MdocSignRequest) -> Result<Vec<u8>> {
        let value = ciborium::Value::Map(vec![
            (
                ciborium::Value::Text("docType".to_string()),
                ciborium::Value::Text("org.iso.18013.5.1.mDL".to_string()),
            ),
            (
                ciborium::Value::Text("deviceKey".to_string()),
                ciborium::Value::Bytes(request.device_key.clone()),
            ),
        ]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&value, &mut bytes)?;
        Ok(bytes)
    }
}

impl Signer for ProviderImpl {
    async fn signing_material(&self) -> Result<SigningMaterial> {
        Ok(self.0.signing.clone())
    }
}

impl Caches for ProviderImpl {
    fn ephemeral_keys(&self) -> &EphemeralKeys {
        &self.0.ephemeral_keys
    }

    fn document_cache(&self) -> &DocumentCache {
        &self.0.document_cache
    }

    fn replay_cache(&self) -> &ReplayCache {
        &self.0.replay_cache
    }
}
