//! Content type definitions and the registry that holds them.
//!
//! # Responsibility
//! - Describe one logical type: address segments, address fields, version
//!   axes, title field, redirect rules, reference fields.
//! - Resolve addresses from paths and content, and parse serialized
//!   addresses back through the declared segment names.
//!
//! # Invariants
//! - A definition that recorded a build error cannot be registered.
//! - Type names are unique within one registry.

use super::redirect::RedirectRule;
use super::RegistryError;
use crate::model::address::{Address, VersionedAddress};
use crate::model::property_path::{PathError, PropertyPath};
use crate::model::version::ItemVersion;
use crate::model::TypeName;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const DEFAULT_TITLE_FIELD: &str = "Title";

/// Declaration of one logical content type.
#[derive(Debug, Clone)]
pub struct ContentTypeDef {
    name: TypeName,
    segment_names: Vec<String>,
    address_fields: Vec<(String, PropertyPath)>,
    version_axes: Vec<String>,
    redirects: Vec<RedirectRule>,
    title_path: Option<PropertyPath>,
    carries_metadata: bool,
    template: Value,
    interfaces: Vec<String>,
    reference_fields: Vec<PropertyPath>,
    build_error: Option<RegistryError>,
}

impl ContentTypeDef {
    pub fn new(name: &str) -> Self {
        let (name, build_error) = match TypeName::new(name) {
            Ok(name) => (name, None),
            Err(err) => (
                TypeName::from(name),
                Some(RegistryError::InvalidRule(err.to_string())),
            ),
        };
        let title_path = PropertyPath::parse(DEFAULT_TITLE_FIELD).ok();
        Self {
            name,
            segment_names: Vec::new(),
            address_fields: Vec::new(),
            version_axes: Vec::new(),
            redirects: Vec::new(),
            title_path,
            carries_metadata: false,
            template: Value::Object(Map::new()),
            interfaces: Vec::new(),
            reference_fields: Vec::new(),
            build_error,
        }
    }

    /// Declares path segment names in path order.
    pub fn segments(mut self, names: &[&str]) -> Self {
        self.segment_names = names.iter().map(|name| name.trim().to_string()).collect();
        self
    }

    /// Maps an address segment to a content field, so the address can be
    /// derived from (and written into) the content data.
    pub fn address_field(mut self, segment: &str, field_path: &str) -> Self {
        if let Some(path) = self.compile(field_path) {
            let segment = segment.trim().to_string();
            if !self.segment_names.iter().any(|s| s.eq_ignore_ascii_case(&segment)) {
                self.segment_names.push(segment.clone());
            }
            self.address_fields.push((segment, path));
        }
        self
    }

    /// Declares the version axes applicable to this type.
    pub fn version_axes(mut self, axes: &[&str]) -> Self {
        self.version_axes = axes.iter().map(|axis| axis.trim().to_string()).collect();
        self
    }

    pub fn title_field(mut self, field_path: &str) -> Self {
        if let Some(path) = self.compile(field_path) {
            self.title_path = Some(path);
        }
        self
    }

    pub fn redirect(mut self, rule: Result<RedirectRule, RegistryError>) -> Self {
        match rule {
            Ok(rule) => self.redirects.push(rule),
            Err(err) => self.remember(err),
        }
        self
    }

    /// Content of this type mirrors container metadata (identity, path,
    /// extension fields).
    pub fn carries_metadata(mut self) -> Self {
        self.carries_metadata = true;
        self
    }

    /// JSON body used for newly created items.
    pub fn template(mut self, template: Value) -> Self {
        self.template = template;
        self
    }

    /// Declares an abstract group this type can be referenced as.
    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.trim().to_string());
        self
    }

    /// Declares a field holding a reference to another item.
    pub fn reference_field(mut self, field_path: &str) -> Self {
        if let Some(path) = self.compile(field_path) {
            self.reference_fields.push(path);
        }
        self
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn segment_names(&self) -> &[String] {
        &self.segment_names
    }

    pub fn axes(&self) -> &[String] {
        &self.version_axes
    }

    pub fn redirects(&self) -> &[RedirectRule] {
        &self.redirects
    }

    pub fn is_metadata_carrier(&self) -> bool {
        self.carries_metadata
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Whether the address is derived from content fields.
    pub fn derives_address_from_data(&self) -> bool {
        !self.address_fields.is_empty()
    }

    pub fn is_reference_field(&self, path: &PropertyPath) -> bool {
        self.reference_fields.iter().any(|field| field == path)
    }

    /// Fresh JSON body for a new item.
    pub fn new_data(&self) -> Value {
        self.template.clone()
    }

    pub fn title_of(&self, data: &Value) -> Option<String> {
        let value = self.title_path.as_ref()?.get(data)?;
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn address_from_path(&self, path: &str) -> Address {
        Address::from_path(self.name.clone(), path, &self.segment_names)
    }

    /// Address derived from address fields; empty when no field has a value.
    pub fn address_from_data(&self, data: &Value) -> Address {
        let mut address = Address::new(self.name.clone());
        for (segment, path) in &self.address_fields {
            match path.get(data) {
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    address.insert(segment.clone(), text)
                }
                Some(Value::Number(number)) => address.insert(segment.clone(), &number.to_string()),
                _ => {}
            }
        }
        address.fix_case(&self.segment_names);
        address
    }

    /// Writes address segment values into the mapped content fields.
    pub fn apply_address(&self, address: &Address, data: &mut Value) -> Result<(), PathError> {
        for (segment, path) in &self.address_fields {
            if let Some(value) = address.get(segment) {
                path.set(data, Value::String(value.to_string()))?;
            }
        }
        Ok(())
    }

    fn compile(&mut self, field_path: &str) -> Option<PropertyPath> {
        match PropertyPath::parse(field_path) {
            Ok(path) => Some(path),
            Err(source) => {
                let type_name = self.name.to_string();
                self.remember(RegistryError::InvalidPath { type_name, source });
                None
            }
        }
    }

    fn remember(&mut self, err: RegistryError) {
        if self.build_error.is_none() {
            self.build_error = Some(err);
        }
    }
}

/// Registry of all content types, built once at startup.
#[derive(Debug, Default)]
pub struct ContentTypeRegistry {
    types: BTreeMap<TypeName, ContentTypeDef>,
}

impl ContentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one type definition.
    pub fn register(&mut self, def: ContentTypeDef) -> Result<(), RegistryError> {
        if let Some(err) = def.build_error {
            return Err(err);
        }
        if self.types.contains_key(&def.name) {
            return Err(RegistryError::DuplicateType(def.name.to_string()));
        }
        self.types.insert(def.name.clone(), def);
        Ok(())
    }

    /// Builder-style registration for startup code.
    pub fn with(mut self, def: ContentTypeDef) -> Result<Self, RegistryError> {
        self.register(def)?;
        Ok(self)
    }

    pub fn get(&self, name: &TypeName) -> Option<&ContentTypeDef> {
        self.types.get(name)
    }

    pub fn require(&self, name: &TypeName) -> Result<&ContentTypeDef, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &TypeName> {
        self.types.keys()
    }

    /// Redirect rules of a type; empty for unknown types.
    pub fn redirects(&self, name: &TypeName) -> &[RedirectRule] {
        self.get(name)
            .map(ContentTypeDef::redirects)
            .unwrap_or_default()
    }

    pub fn segment_names(&self, name: &TypeName) -> &[String] {
        self.get(name)
            .map(ContentTypeDef::segment_names)
            .unwrap_or_default()
    }

    /// Version restricted to the axes applicable to a type.
    ///
    /// Unknown types keep the version unchanged.
    pub fn applicable_version(&self, name: &TypeName, version: &ItemVersion) -> ItemVersion {
        match self.get(name) {
            Some(def) => version.restrict_to(def.axes()),
            None => version.clone(),
        }
    }

    pub fn carries_metadata(&self, name: &TypeName) -> bool {
        self.get(name).is_some_and(ContentTypeDef::is_metadata_carrier)
    }

    pub fn address_from_path(&self, name: &TypeName, path: &str) -> Address {
        Address::from_path(name.clone(), path, self.segment_names(name))
    }

    /// Rewrites segment-name casing and order to the declared form.
    pub fn fix_case(&self, address: &mut Address) {
        let declared = self.segment_names(address.content_type());
        address.fix_case(declared);
    }

    /// Parses `<Type>:<path>` as produced by `Address`'s `Display`.
    pub fn parse_address(&self, serialized: &str) -> Result<Address, RegistryError> {
        let (type_part, path) = serialized.split_once(':').ok_or_else(|| {
            RegistryError::InvalidRule(format!("serialized address `{serialized}` lacks `:`"))
        })?;
        let name = TypeName::new(type_part)
            .map_err(|err| RegistryError::InvalidRule(err.to_string()))?;
        let def = self.require(&name)?;
        Ok(def.address_from_path(path))
    }

    /// Parses `<Type>:<path>?<axis=value&...>`.
    pub fn parse_versioned_address(
        &self,
        serialized: &str,
    ) -> Result<VersionedAddress, RegistryError> {
        let (address_part, version_part) = serialized.split_once('?').unwrap_or((serialized, ""));
        let address = self.parse_address(address_part)?;
        let version = version_part
            .parse::<ItemVersion>()
            .map_err(|err| RegistryError::InvalidRule(err.to_string()))?;
        Ok(VersionedAddress::new(address, version))
    }

    /// Content types a reference to `target` may point at.
    ///
    /// A registered type only admits itself; otherwise every type declaring
    /// `target` as an interface is assignable.
    pub fn assignable_types(&self, target: &str) -> Vec<TypeName> {
        let target = target.trim();
        if let Some(def) = self.types.get(&TypeName::from(target)) {
            return vec![def.name.clone()];
        }
        self.types
            .values()
            .filter(|def| def.interfaces.iter().any(|iface| iface == target))
            .map(|def| def.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentTypeDef, ContentTypeRegistry};
    use crate::model::version::ItemVersion;
    use crate::model::TypeName;
    use crate::schema::redirect::RedirectRule;
    use crate::schema::RegistryError;
    use serde_json::json;

    fn registry() -> ContentTypeRegistry {
        ContentTypeRegistry::new()
            .with(
                ContentTypeDef::new("News.Article")
                    .segments(&["Section", "Slug"])
                    .address_field("Slug", "Slug")
                    .version_axes(&["lang"])
                    .implements("Page")
                    .redirect(RedirectRule::new(Some("News.Index"), "index", &["IndexTitle > Title"])),
            )
            .and_then(|r| r.with(ContentTypeDef::new("News.Index").implements("Page")))
            .unwrap()
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry();
        let err = registry.register(ContentTypeDef::new("News.Index")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateType("News.Index".to_string()));
    }

    #[test]
    fn invalid_field_path_blocks_registration() {
        let mut registry = ContentTypeRegistry::new();
        let err = registry
            .register(ContentTypeDef::new("Bad").title_field("a..b"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPath { .. }));
    }

    #[test]
    fn parse_address_round_trips_display() {
        let registry = registry();
        let address = registry.address_from_path(&TypeName::from("News.Article"), "/World/Big-Story");
        let parsed = registry.parse_address(&address.to_string()).unwrap();
        assert_eq!(parsed, address);
        assert_eq!(parsed.get("Slug"), Some("big-story"));
    }

    #[test]
    fn address_from_data_and_apply_address_are_symmetric() {
        let registry = registry();
        let def = registry.get(&TypeName::from("News.Article")).unwrap();
        let mut data = json!({"Slug": "Hello"});
        let address = def.address_from_data(&data);
        assert_eq!(address.get("slug"), Some("hello"));

        let moved = def.address_from_path("/world/moved");
        def.apply_address(&moved, &mut data).unwrap();
        assert_eq!(data["Slug"], json!("moved"));
    }

    #[test]
    fn applicable_version_drops_foreign_axes() {
        let registry = registry();
        let version = ItemVersion::new().with("lang", "en").with("stage", "draft");
        let applied = registry.applicable_version(&TypeName::from("News.Article"), &version);
        assert_eq!(applied, ItemVersion::new().with("lang", "en"));
        let index = registry.applicable_version(&TypeName::from("News.Index"), &version);
        assert!(index.is_empty());
    }

    #[test]
    fn assignable_types_resolve_interfaces() {
        let registry = registry();
        assert_eq!(
            registry.assignable_types("News.Index"),
            vec![TypeName::from("News.Index")]
        );
        assert_eq!(registry.assignable_types("Page").len(), 2);
        assert!(registry.assignable_types("Missing").is_empty());
    }
}
