//! # Event Payload Schemas
//!
//! Concrete shapes of the `payload.payload` object for every application
//! event kind the stream publishes. Fields missing from a frame fall back to
//! their defaults so a partially populated event still decodes; only a type
//! mismatch on a present field is treated as a decode failure.

use serde::{Deserialize, Serialize};

/// A wallet address wrapper (`maker`, `taker`, `from_account`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub address: String,
}

/// A reference to a collection by slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionRef {
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chain {
    pub name: String,
}

/// The token an order is priced in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentToken {
    pub address: String,
    pub decimals: u32,
    pub eth_price: f64,
    pub name: String,
    #[serde(alias = "Symbol")]
    pub symbol: String,
    pub usd_price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    #[serde(alias = "Timestamp")]
    pub timestamp: String,
    pub hash: String,
}

/// Display metadata of an item. Listings carry the short form
/// (`image_url`), offers and metadata updates the long form; both fit here.
/// Every field is nullable on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub image_preview_url: Option<String>,
    pub animation_url: Option<String>,
    pub background_color: Option<String>,
    pub metadata_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub chain: Chain,
    pub metadata: ItemMetadata,
    pub nft_id: String,
    pub permalink: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressCriteria {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitCriteria {
    pub trait_name: String,
    pub trait_type: String,
}

/// `item_listed`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemListed {
    pub event_timestamp: String,
    pub base_price: String,
    pub collection: CollectionRef,
    pub expiration_date: String,
    pub is_private: bool,
    pub listing_date: String,
    pub listing_type: String,
    pub maker: Account,
    pub payment_token: PaymentToken,
    pub item: Item,
    pub quantity: u64,
    pub taker: Option<Account>,
}

/// `item_sold`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSold {
    pub event_timestamp: String,
    pub closing_date: String,
    pub is_private: bool,
    pub listing_date: String,
    pub listing_type: String,
    pub maker: Account,
    pub payment_token: PaymentToken,
    pub item: Item,
    pub quantity: u64,
    pub taker: Account,
    pub transaction: Transaction,
}

/// `item_transferred`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemTransferred {
    pub event_timestamp: String,
    pub transaction: Transaction,
    pub from_account: Account,
    pub to_account: Account,
    pub item: Item,
    pub quantity: u64,
}

/// `item_metadata_updated`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadataUpdated {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_preview_url: Option<String>,
    pub animation_url: Option<String>,
    pub background_color: Option<String>,
    pub metadata_url: Option<String>,
}

/// `item_cancelled`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemCancelled {
    pub event_timestamp: String,
    pub listing_type: String,
    pub payment_token: PaymentToken,
    pub item: Item,
    pub quantity: u64,
    pub transaction: Transaction,
}

/// Shape shared by `item_received_offer` and `item_received_bid`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemOffer {
    pub event_timestamp: String,
    pub base_price: String,
    pub created_date: String,
    pub expiration_date: String,
    pub item: Item,
    pub maker: Account,
    pub payment_token: PaymentToken,
    pub quantity: u64,
    pub taker: Option<Account>,
}

/// `collection_offer`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOffer {
    pub asset_contract_criteria: AddressCriteria,
    pub base_price: String,
    pub collection: CollectionRef,
    pub collection_criteria: CollectionRef,
    pub created_date: String,
    pub event_timestamp: String,
    pub expiration_date: String,
    pub maker: Account,
    pub order_hash: String,
    pub payment_token: PaymentToken,
    pub quantity: u64,
}

/// `trait_offer`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitOffer {
    pub asset_contract_criteria: AddressCriteria,
    pub base_price: String,
    pub collection: CollectionRef,
    pub collection_criteria: CollectionRef,
    pub created_date: String,
    pub event_timestamp: String,
    pub expiration_date: String,
    pub maker: Account,
    pub order_hash: String,
    pub payment_token: PaymentToken,
    pub quantity: u64,
    pub trait_criteria: TraitCriteria,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let sold: ItemSold = serde_json::from_value(json!({"quantity": 2})).unwrap();
        assert_eq!(sold.quantity, 2);
        assert_eq!(sold.taker, Account::default());
        assert!(sold.transaction.hash.is_empty());
    }

    #[test]
    fn test_capitalised_legacy_keys_are_accepted() {
        let token: PaymentToken = serde_json::from_value(json!({"Symbol": "ETH", "eth_price": 1})).unwrap();
        assert_eq!(token.symbol, "ETH");
        assert_eq!(token.eth_price, 1.0);

        let tx: Transaction = serde_json::from_value(json!({"Timestamp": "2023-01-01T00:00:00"})).unwrap();
        assert_eq!(tx.timestamp, "2023-01-01T00:00:00");
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let res = serde_json::from_value::<ItemListed>(json!({"quantity": "many"}));
        assert!(res.is_err());
    }
}
