/// Syntactic email check. Deliverability is the mail server's problem.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > 254 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    let valid_local = |c: char| c.is_alphanumeric() || ".-+_'".contains(c);
    let valid_domain = |c: char| c.is_alphanumeric() || c == '.' || c == '-';

    if !local.chars().all(valid_local) || !domain.chars().all(valid_domain) {
        return false;
    }

    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

/// Treats whitespace-only strings as missing.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
