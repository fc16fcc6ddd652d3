//! Walks through a login against a real provider.
//!
//! ```text
//! cargo run --example b2c_login -- rp_config.json
//! cargo run --example b2c_login -- rp_config.json <code> <nonce>
//! ```
//!
//! The first form prints an authorization URL together with the state and nonce it
//! carries. After signing in, pass the `code` from the redirect and the printed nonce
//! to exchange it and validate the returned ID token.

use nila_oidc_rp::prelude::*;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nila_oidc_rp=debug".parse()?))
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "rp_config.json".to_string());
    let settings: ProviderSettings = serde_json::from_str(&fs::read_to_string(&config_path)?)?;

    let config = settings
        .into_builder()?
        .cache(Arc::new(MemoryCacheStore::default()))
        .build()?;
    let rp = RelyingParty::new(config);

    match (args.next(), args.next()) {
        (Some(code), Some(nonce)) => {
            let id_token = rp.id_token_from_code(&code).await?;
            let claims = rp.validate_id_token(&id_token, &nonce).await?;
            println!("Signed in as {:?}", claims.sub());
            println!("{}", serde_json::to_string_pretty(claims.as_map())?);

            let logout = rp
                .end_session_url(Some(rp.config().redirect_uri()), None, Some(&id_token))
                .await?;
            println!("Sign out: {logout}");
        }
        _ => {
            let state = generate_state(DEFAULT_RANDOM_LENGTH);
            let nonce = generate_nonce(DEFAULT_RANDOM_LENGTH);
            let params = AuthorizationParams::new()
                .state(state.as_str())
                .nonce(nonce.as_str())
                .response_type("code")
                .response_mode("query");

            println!("Open: {}", rp.authorization_url(&params).await?);
            println!("state: {state}");
            println!("nonce: {nonce}");
        }
    }

    Ok(())
}
