//! Maps each source's payload into the canonical `LookupResult` schema.
//!
//! Every key a source promises is always present; values the upstream left
//! out (or sent empty) carry [`NOT_INFORMED`]. Names are upper-cased with
//! diacritics stripped so the three sources display consistently.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::BTreeMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{LookupResult, LookupSource, ProfessionalRecord, RawPayload, TaxpayerId};
use crate::validator;

/// Sentinel for a promised field the upstream did not provide.
pub const NOT_INFORMED: &str = "Não informado";

pub const COMPANY_FIELDS: &[&str] = &[
    "cnpj",
    "nome",
    "nome_fantasia",
    "tipo",
    "abertura",
    "situacao",
    "situacao_especial",
    "data_situacao",
    "motivo_situacao",
    "cnae_principal.codigo",
    "cnae_principal.descricao",
    "endereco.logradouro",
    "endereco.numero",
    "endereco.complemento",
    "endereco.bairro",
    "endereco.cep",
    "endereco.municipio",
    "endereco.uf",
    "contato.telefone",
    "contato.email",
];

pub const PERSON_FIELDS: &[&str] = &["cpf", "nome", "genero", "data_nascimento"];

pub const PROFESSIONAL_FIELDS: &[&str] = &["cpf", "nome", "situacao", "titulo"];

/// Keys guaranteed in `fields` for results from `source`.
pub fn schema(source: LookupSource) -> &'static [&'static str] {
    match source {
        LookupSource::RegistryApi => COMPANY_FIELDS,
        LookupSource::ThirdPartyApi => PERSON_FIELDS,
        LookupSource::PortalScrape => PROFESSIONAL_FIELDS,
    }
}

/// Builds the canonical result for a found record.
pub fn normalize(id: &TaxpayerId, raw: &RawPayload) -> LookupResult {
    let source = raw.source();
    let mut fields = match raw {
        RawPayload::Company(data) => company_fields(id, data),
        RawPayload::Person(data) => person_fields(id, data),
        RawPayload::Professional(record) => professional_fields(id, record),
    };

    for key in schema(source) {
        fields
            .entry((*key).to_string())
            .or_insert_with(|| NOT_INFORMED.to_string());
    }

    LookupResult {
        id: id.clone(),
        found: true,
        fields,
        source_used: source,
    }
}

/// Upper-cases a name and strips its diacritics ("José Conceição" → "JOSE CONCEICAO").
pub fn normalize_name(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty trimmed text at `path`; numbers are rendered as-is.
fn text_at(data: &Value, path: &[&str]) -> Option<String> {
    let mut node = data;
    for key in path {
        node = node.get(*key)?;
    }
    let text = match node {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn put(fields: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    fields.insert(
        key.to_string(),
        value.unwrap_or_else(|| NOT_INFORMED.to_string()),
    );
}

fn company_fields(id: &TaxpayerId, data: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    put(&mut fields, "cnpj", Some(id.formatted()));
    put(
        &mut fields,
        "nome",
        text_at(data, &["nome"]).map(|n| normalize_name(&n)),
    );
    put(
        &mut fields,
        "nome_fantasia",
        text_at(data, &["fantasia"]).map(|n| normalize_name(&n)),
    );

    for (key, upstream) in [
        ("tipo", "tipo"),
        ("abertura", "abertura"),
        ("situacao", "situacao"),
        ("situacao_especial", "situacao_especial"),
        ("data_situacao", "data_situacao"),
        ("motivo_situacao", "motivo_situacao"),
        ("endereco.logradouro", "logradouro"),
        ("endereco.numero", "numero"),
        ("endereco.complemento", "complemento"),
        ("endereco.bairro", "bairro"),
        ("endereco.municipio", "municipio"),
        ("endereco.uf", "uf"),
        ("contato.telefone", "telefone"),
        ("contato.email", "email"),
    ] {
        put(&mut fields, key, text_at(data, &[upstream]));
    }

    put(
        &mut fields,
        "endereco.cep",
        text_at(data, &["cep"]).map(|cep| validator::format_cep(&cep)),
    );

    let primary_activity = data
        .get("atividade_principal")
        .and_then(Value::as_array)
        .and_then(|activities| activities.first());
    put(
        &mut fields,
        "cnae_principal.codigo",
        primary_activity.and_then(|a| text_at(a, &["code"])),
    );
    put(
        &mut fields,
        "cnae_principal.descricao",
        primary_activity.and_then(|a| text_at(a, &["text"])),
    );

    fields
}

/// Person payloads may nest the record under `data`; root fields are the fallback.
fn person_text(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|&key| text_at(data, &["data", key]).or_else(|| text_at(data, &[key])))
}

fn gender_label(raw: &str) -> String {
    match raw.trim().to_uppercase().as_str() {
        "M" => "MASCULINO".to_string(),
        "F" => "FEMININO".to_string(),
        other => normalize_name(other),
    }
}

/// Renders ISO dates as `DD/MM/YYYY`; anything else passes through.
fn birth_date_label(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%d/%m/%Y").to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%d/%m/%Y").to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format("%d/%m/%Y").to_string();
        }
    }
    raw.to_string()
}

fn person_fields(id: &TaxpayerId, data: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    put(&mut fields, "cpf", Some(id.formatted()));
    put(
        &mut fields,
        "nome",
        person_text(data, &["nome"]).map(|n| normalize_name(&n)),
    );
    put(
        &mut fields,
        "genero",
        person_text(data, &["genero", "sexo"]).map(|g| gender_label(&g)),
    );
    put(
        &mut fields,
        "data_nascimento",
        person_text(data, &["data_nascimento", "nascimento"]).map(|d| birth_date_label(&d)),
    );
    fields
}

fn professional_fields(id: &TaxpayerId, record: &ProfessionalRecord) -> BTreeMap<String, String> {
    let clean = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut fields = BTreeMap::new();
    put(&mut fields, "cpf", Some(id.formatted()));
    put(
        &mut fields,
        "nome",
        clean(&record.nome).map(|n| normalize_name(&n)),
    );
    put(&mut fields, "situacao", clean(&record.situacao));
    put(&mut fields, "titulo", clean(&record.titulo));
    fields
}
