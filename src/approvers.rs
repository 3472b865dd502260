use crate::config::ApproverConfig;

/// Role sets entitled to approve a registration for a given branch.
///
/// Business roles are global. IT roles carry an optional branch filter: when
/// present, only identities in those roles whose branch matches count as
/// approvers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproverRoleSets {
    pub business_roles: Vec<String>,
    pub it_roles: Vec<String>,
    pub it_branch: Option<String>,
}

/// Pure lookup from branch name to approver role sets. Built once at startup
/// from [`ApproverConfig`]; never touches storage and never fails. Unknown
/// branch names simply produce an IT filter that matches nothing.
#[derive(Debug, Clone)]
pub struct ApproverResolver {
    business_roles: Vec<String>,
    it_roles: Vec<String>,
    it_branch_restricted: bool,
}

impl ApproverResolver {
    pub fn new(config: &ApproverConfig) -> Self {
        // Role matching is case-insensitive throughout; normalize once here
        Self {
            business_roles: normalize(&config.business_roles),
            it_roles: normalize(&config.it_roles),
            it_branch_restricted: config.it_branch_restricted,
        }
    }

    pub fn resolve(&self, branch: &str) -> ApproverRoleSets {
        ApproverRoleSets {
            business_roles: self.business_roles.clone(),
            it_roles: self.it_roles.clone(),
            it_branch: self
                .it_branch_restricted
                .then(|| branch.to_string()),
        }
    }
}

fn normalize(roles: &[String]) -> Vec<String> {
    roles.iter().map(|r| r.trim().to_uppercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(restricted: bool) -> ApproverConfig {
        ApproverConfig {
            business_roles: vec!["MD".into(), "jmd".into()],
            it_roles: vec!["it head".into()],
            it_branch_restricted: restricted,
        }
    }

    #[test]
    fn business_roles_are_global_and_uppercased() {
        let resolver = ApproverResolver::new(&config(true));
        let sets = resolver.resolve("North");
        assert_eq!(sets.business_roles, vec!["MD".to_string(), "JMD".to_string()]);
        assert_eq!(sets.it_roles, vec!["IT HEAD".to_string()]);
    }

    #[test]
    fn it_filter_carries_branch_when_restricted() {
        let resolver = ApproverResolver::new(&config(true));
        assert_eq!(resolver.resolve("North").it_branch, Some("North".to_string()));
    }

    #[test]
    fn it_filter_absent_when_unrestricted() {
        let resolver = ApproverResolver::new(&config(false));
        assert_eq!(resolver.resolve("North").it_branch, None);
    }

    #[test]
    fn unknown_branch_still_resolves() {
        let resolver = ApproverResolver::new(&config(true));
        let sets = resolver.resolve("NoSuchBranch");
        assert_eq!(sets.it_branch, Some("NoSuchBranch".to_string()));
        assert!(!sets.business_roles.is_empty());
    }
}
