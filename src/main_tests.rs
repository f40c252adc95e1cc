use super::require_actor;
use crate::app::AppError;
use crate::domain::role::Role;

#[test]
fn writes_need_both_user_and_role() {
    let missing_user = require_actor(&None, Some(Role::Staff)).expect_err("user is required");
    assert!(missing_user.to_string().contains("MILL_USER"));

    let missing_role =
        require_actor(&Some("ravi".to_string()), None).expect_err("role is required");
    assert!(missing_role.to_string().contains("MILL_ROLE"));

    let blank = require_actor(&Some("  ".to_string()), Some(Role::Staff))
        .expect_err("blank user is rejected");
    assert!(matches!(blank, AppError::Actor(_)));

    let actor = require_actor(&Some(" ravi ".to_string()), Some(Role::Staff))
        .expect("actor should build");
    assert_eq!(actor.user, "ravi");
    assert_eq!(actor.role, Role::Staff);
}
