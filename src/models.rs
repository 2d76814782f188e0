use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::validator;

// ============ Identifiers ============

/// Kind of Brazilian taxpayer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdKind {
    /// Individual taxpayer (11 digits).
    Cpf,
    /// Corporate taxpayer (14 digits).
    Cnpj,
}

impl IdKind {
    /// Number of digits an identifier of this kind carries.
    pub fn digit_count(self) -> usize {
        match self {
            IdKind::Cpf => 11,
            IdKind::Cnpj => 14,
        }
    }

    /// Error code reported to callers when an identifier of this kind is rejected.
    pub fn invalid_code(self) -> &'static str {
        match self {
            IdKind::Cpf => "invalid_cpf",
            IdKind::Cnpj => "invalid_cnpj",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IdKind::Cpf => "CPF",
            IdKind::Cnpj => "CNPJ",
        }
    }
}

/// A validated CPF or CNPJ.
///
/// `digits` only ever holds decimal characters, 11 for a CPF and 14 for a CNPJ,
/// with both check digits verified. Formatting punctuation from the raw input
/// is discarded on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxpayerId {
    kind: IdKind,
    digits: String,
}

impl TaxpayerId {
    /// Parses raw caller input as an identifier of the given kind.
    ///
    /// Returns `None` when the stripped input has the wrong length or fails
    /// check-digit validation.
    pub fn parse(raw: &str, kind: IdKind) -> Option<Self> {
        let digits = validator::strip_non_digits(raw);
        let valid = match kind {
            IdKind::Cpf => validator::is_valid_cpf(&digits),
            IdKind::Cnpj => validator::is_valid_cnpj(&digits),
        };
        valid.then_some(Self { kind, digits })
    }

    /// Parses raw input, inferring the kind from the number of digits.
    pub fn parse_any(raw: &str) -> Option<Self> {
        match validator::strip_non_digits(raw).len() {
            11 => Self::parse(raw, IdKind::Cpf),
            14 => Self::parse(raw, IdKind::Cnpj),
            _ => None,
        }
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Punctuated display form (`###.###.###-##` or `##.###.###/####-##`).
    pub fn formatted(&self) -> String {
        match self.kind {
            IdKind::Cpf => validator::format_cpf(&self.digits),
            IdKind::Cnpj => validator::format_cnpj(&self.digits),
        }
    }

    /// Log-safe form showing only the first three and last two digits.
    pub fn masked(&self) -> String {
        let len = self.digits.len();
        format!(
            "{}{}{}",
            &self.digits[..3],
            "*".repeat(len - 5),
            &self.digits[len - 2..]
        )
    }
}

impl fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.masked())
    }
}

// ============ Sources ============

/// Upstream backend a lookup is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    /// Company registry JSON API (CNPJ only).
    RegistryApi,
    /// Third-party person JSON API (CPF only).
    ThirdPartyApi,
    /// Professional-registry portal, scraped through a headless browser (CPF only).
    PortalScrape,
}

impl LookupSource {
    pub const ALL: [LookupSource; 3] = [
        LookupSource::RegistryApi,
        LookupSource::ThirdPartyApi,
        LookupSource::PortalScrape,
    ];

    /// The only identifier kind this source accepts.
    pub fn accepted_kind(self) -> IdKind {
        match self {
            LookupSource::RegistryApi => IdKind::Cnpj,
            LookupSource::ThirdPartyApi | LookupSource::PortalScrape => IdKind::Cpf,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LookupSource::RegistryApi => "registry_api",
            LookupSource::ThirdPartyApi => "third_party_api",
            LookupSource::PortalScrape => "portal_scrape",
        }
    }
}

impl fmt::Display for LookupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============ Raw upstream payloads ============

/// Row extracted from the portal's results table.
///
/// Cells the row did not carry stay `None`; the normalizer fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalRecord {
    pub nome: Option<String>,
    pub situacao: Option<String>,
    pub titulo: Option<String>,
}

/// What an adapter hands to the normalizer, tagged by origin.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Registry API body, unmodified.
    Company(Value),
    /// Person API body, unmodified.
    Person(Value),
    /// Cells read from the portal's first result row.
    Professional(ProfessionalRecord),
}

impl RawPayload {
    pub fn source(&self) -> LookupSource {
        match self {
            RawPayload::Company(_) => LookupSource::RegistryApi,
            RawPayload::Person(_) => LookupSource::ThirdPartyApi,
            RawPayload::Professional(_) => LookupSource::PortalScrape,
        }
    }
}

// ============ Canonical result ============

/// Canonical lookup result shared by every source.
///
/// Every key the source's schema promises is present in `fields`; values the
/// upstream omitted carry [`crate::normalizer::NOT_INFORMED`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    pub id: TaxpayerId,
    pub found: bool,
    pub fields: BTreeMap<String, String>,
    pub source_used: LookupSource,
}

impl LookupResult {
    /// Renders `fields` as a JSON object, expanding dotted keys such as
    /// `endereco.cep` into nested objects.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        for (key, value) in &self.fields {
            insert_dotted(&mut root, key, value);
        }
        Value::Object(root)
    }
}

fn insert_dotted(target: &mut Map<String, Value>, key: &str, value: &str) {
    match key.split_once('.') {
        None => {
            target.insert(key.to_string(), Value::String(value.to_string()));
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_dotted(map, rest, value);
            }
        }
    }
}

// ============ API Request Models ============

/// Query string of the CNPJ endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CnpjQueryParams {
    pub cnpj: Option<String>,
}

/// Query string of the CPF endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct CpfQueryParams {
    pub cpf: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_punctuation() {
        let id = TaxpayerId::parse("111.444.777-35", IdKind::Cpf).unwrap();
        assert_eq!(id.digits(), "11144477735");
        assert_eq!(id.kind(), IdKind::Cpf);
        assert_eq!(id.formatted(), "111.444.777-35");
    }

    #[test]
    fn test_parse_rejects_wrong_kind() {
        assert!(TaxpayerId::parse("11222333000181", IdKind::Cpf).is_none());
        assert!(TaxpayerId::parse("11144477735", IdKind::Cnpj).is_none());
    }

    #[test]
    fn test_parse_any_infers_kind() {
        let cnpj = TaxpayerId::parse_any("11.222.333/0001-81").unwrap();
        assert_eq!(cnpj.kind(), IdKind::Cnpj);
        assert_eq!(cnpj.formatted(), "11.222.333/0001-81");
        assert!(TaxpayerId::parse_any("123").is_none());
    }

    #[test]
    fn test_masked_hides_middle_digits() {
        let id = TaxpayerId::parse("11144477735", IdKind::Cpf).unwrap();
        assert_eq!(id.masked(), "111******35");
        assert_eq!(id.to_string(), "CPF 111******35");
    }

    #[test]
    fn test_to_json_nests_dotted_keys() {
        let mut fields = BTreeMap::new();
        fields.insert("nome".to_string(), "EMPRESA".to_string());
        fields.insert("endereco.cep".to_string(), "30140-071".to_string());
        fields.insert("endereco.uf".to_string(), "MG".to_string());
        let result = LookupResult {
            id: TaxpayerId::parse("11222333000181", IdKind::Cnpj).unwrap(),
            found: true,
            fields,
            source_used: LookupSource::RegistryApi,
        };

        let json = result.to_json();
        assert_eq!(json["nome"], "EMPRESA");
        assert_eq!(json["endereco"]["cep"], "30140-071");
        assert_eq!(json["endereco"]["uf"], "MG");
    }

    #[test]
    fn test_source_accepted_kinds() {
        assert_eq!(LookupSource::RegistryApi.accepted_kind(), IdKind::Cnpj);
        assert_eq!(LookupSource::ThirdPartyApi.accepted_kind(), IdKind::Cpf);
        assert_eq!(LookupSource::PortalScrape.accepted_kind(), IdKind::Cpf);
    }
}
