//! Store role checks.

use axum::http::StatusCode;

use winqer_core::{OrgRole, StoreRole};
use winqer_dashboard::error::AppError;
use winqer_dashboard::services::check_role;

#[test]
fn test_missing_role_is_forbidden() {
    let err = check_role(None, StoreRole::StoreViewer).expect_err("no role");
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[test]
fn test_viewer_cannot_change_settings() {
    let err = check_role(Some(StoreRole::StoreViewer), StoreRole::StoreAdmin).expect_err("viewer");
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[test]
fn test_roles_satisfy_themselves_and_weaker_roles() {
    for (held, required, allowed) in [
        (StoreRole::StoreAdmin, StoreRole::StoreAdmin, true),
        (StoreRole::StoreAdmin, StoreRole::StoreViewer, true),
        (StoreRole::StoreViewer, StoreRole::StoreViewer, true),
        (StoreRole::StoreViewer, StoreRole::StoreAdmin, false),
    ] {
        assert_eq!(
            check_role(Some(held), required).is_ok(),
            allowed,
            "{held} for {required}"
        );
    }
}

#[test]
fn test_organization_roles_map_to_store_roles() {
    assert_eq!(OrgRole::Owner.implied_store_role(), StoreRole::StoreAdmin);
    assert_eq!(OrgRole::Member.implied_store_role(), StoreRole::StoreViewer);
}

#[test]
fn test_role_wire_format() {
    assert_eq!(
        serde_json::to_value(StoreRole::StoreAdmin).expect("serialize"),
        "STORE_ADMIN"
    );
    let role: StoreRole = serde_json::from_str("\"STORE_VIEWER\"").expect("deserialize");
    assert_eq!(role, StoreRole::StoreViewer);
}
