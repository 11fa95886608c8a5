// src/common/identity.rs

// Normalização de identidades para matching de contatos.
// Funções puras: usadas tanto na escrita (campo normalizado) quanto na busca.

/// Reduz um telefone a apenas dígitos. Retorna `None` quando a entrada
/// não tem nenhum dígito (vazia, só espaços, só pontuação).
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// E-mails são comparados em lowercase, sem espaços nas pontas.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_phone_remove_formatacao() {
        assert_eq!(
            normalize_phone("+55 (11) 99999-9999"),
            Some("5511999999999".to_string())
        );
    }

    #[test]
    fn normalize_phone_mantem_digitos_puros() {
        assert_eq!(normalize_phone("11999999999"), Some("11999999999".to_string()));
    }

    #[test]
    fn normalize_phone_rejeita_entrada_vazia() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("   "), None);
        assert_eq!(normalize_phone("abc-def"), None);
    }

    #[test]
    fn normalize_email_trim_e_lowercase() {
        assert_eq!(
            normalize_email("  Maria@Email.COM "),
            Some("maria@email.com".to_string())
        );
        assert_eq!(normalize_email("   "), None);
    }
}
