use domain::AuthMethod;
use sgbind_auth::{
    AuthError, AuthProfile, AuthResolver, CredentialMaterial, StaticCredentialProvider,
};
use std::sync::Arc;

fn resolver_with(profiles: &[(&str, AuthProfile)]) -> AuthResolver {
    let provider = StaticCredentialProvider::new();
    for (name, profile) in profiles {
        provider.insert(*name, profile.clone());
    }
    AuthResolver::new(Arc::new(provider))
}

#[tokio::test]
async fn none_method_ignores_profile() {
    let resolver = resolver_with(&[]);
    let material = resolver
        .resolve(AuthMethod::None, Some("does-not-exist"))
        .await
        .expect("none always resolves");
    assert_eq!(material, CredentialMaterial::Empty);
}

#[tokio::test]
async fn missing_profile_reported() {
    let resolver = resolver_with(&[]);
    let err = resolver
        .resolve(AuthMethod::Bearer, Some("prod-api"))
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        AuthError::ProfileNotFound {
            profile: "prod-api".to_string()
        }
    );
}

#[tokio::test]
async fn scheme_mismatch_reported_with_detail() {
    let resolver = resolver_with(&[(
        "prod-api",
        AuthProfile {
            scheme: AuthMethod::ApiKey,
            material: CredentialMaterial::ApiKey {
                header: "X-API-Key".to_string(),
                value: "k".to_string(),
            },
        },
    )]);
    let err = resolver
        .resolve(AuthMethod::Bearer, Some("prod-api"))
        .await
        .expect_err("must fail");
    match err {
        AuthError::SchemeMismatch {
            profile,
            declared,
            requested,
        } => {
            assert_eq!(profile, "prod-api");
            assert_eq!(declared, AuthMethod::ApiKey);
            assert_eq!(requested, AuthMethod::Bearer);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn bearer_profile_resolves_material() {
    let resolver = resolver_with(&[(
        "prod-api",
        AuthProfile {
            scheme: AuthMethod::Bearer,
            material: CredentialMaterial::Bearer("token-1".to_string()),
        },
    )]);
    let material = resolver
        .resolve(AuthMethod::Bearer, Some("prod-api"))
        .await
        .expect("resolve");
    assert_eq!(material, CredentialMaterial::Bearer("token-1".to_string()));
}
