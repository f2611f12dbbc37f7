//! Combine caption, typed text and OCR output into one [`ExtractedPayment`].
//!
//! Field priority, highest first: an explicit label the user typed
//! (`amount: 700`, `house: 901`, `month: meskerem`), the rest of the typed
//! text, the photo caption, then OCR text.
//!
//! Edit mode corrects the caller's last accepted submission. A message that is
//! only a number is an amount correction there, never a house number, and any
//! field the new input does not supply keeps its previous value.

use regex::Regex;
use tally_core::{
    classify_reason, convert_to_ethiopian_month, parse_amount, EthiopianMonth, ExtractedPayment, HouseRegistry,
    PaymentReason, ReceiptText,
};

use crate::error::Result;
use crate::parsers::{
    AmountParser, BeneficiaryParser, DateParser, HouseParser, PayerParser, TxidParser,
};

/// Everything one finalized session hands to the extractor.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub receipt: &'a ReceiptText,
    pub edit_mode: bool,
    pub previous: Option<&'a ExtractedPayment>,
    pub registry: Option<&'a HouseRegistry>,
}

impl<'a> ExtractionRequest<'a> {
    pub fn new(receipt: &'a ReceiptText) -> Self {
        Self {
            receipt,
            edit_mode: false,
            previous: None,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: &'a HouseRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn editing(mut self, previous: Option<&'a ExtractedPayment>) -> Self {
        self.edit_mode = true;
        self.previous = previous;
        self
    }
}

/// Labels a user types to correct a single field.
struct InlineLabels {
    amount: Regex,
    amount_suffix: Regex,
    house: Regex,
    month: Regex,
    bare_number: Regex,
}

impl InlineLabels {
    fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            amount: Regex::new(r"(?i)(?:amount|birr|ብር)[:\s]+([0-9.]+)")?,
            amount_suffix: Regex::new(r"(?i)([0-9.]+)\s*(?:birr|ብር)")?,
            house: Regex::new(r"(?i)(?:house|ቤት|home)[:\s]+([0-9]{3,4})")?,
            month: Regex::new(r"(?i)(?:month|ወር)[:\s]+(\w+)")?,
            bare_number: Regex::new(r"^[0-9.]+$")?,
        })
    }
}

#[derive(Debug, Default)]
struct TypedFields {
    amount: Option<String>,
    house: Option<String>,
    month_word: Option<String>,
    bare_number: bool,
    /// Typed text with the amount and month labels cut out.
    remainder: String,
}

impl TypedFields {
    fn has_labels(&self) -> bool {
        self.amount.is_some() || self.month_word.is_some()
    }
}

pub struct ReceiptExtractor {
    amount: AmountParser,
    txid: TxidParser,
    house: HouseParser,
    payer: PayerParser,
    beneficiary: BeneficiaryParser,
    date: DateParser,
    labels: InlineLabels,
}

impl ReceiptExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            amount: AmountParser::new()?,
            txid: TxidParser::new()?,
            house: HouseParser::new()?,
            payer: PayerParser::new()?,
            beneficiary: BeneficiaryParser::new()?,
            date: DateParser::new()?,
            labels: InlineLabels::new()?,
        })
    }

    pub fn amount(&self, text: &str) -> Option<String> {
        self.amount.extract(text)
    }

    pub fn transaction_id(&self, text: &str) -> Option<String> {
        self.txid.extract(text)
    }

    pub fn house_number(&self, text: &str) -> Option<String> {
        self.house.extract(text)
    }

    pub fn beneficiary(&self, text: &str) -> Option<String> {
        self.beneficiary.extract(text)
    }

    /// Extraction for a buffered session (several messages folded together).
    pub fn extract_buffered(&self, req: &ExtractionRequest<'_>) -> ExtractedPayment {
        let receipt = req.receipt;
        let user = receipt.user_text.trim();
        let combined = receipt.combined();
        let typed = self.typed_fields(user, req.edit_mode);

        // A correction that names an amount or month keeps the previous house
        // unless it is labelled explicitly.
        let correcting = req.edit_mode && (typed.bare_number || typed.has_labels());
        let mut house = typed.house.clone();
        if house.is_none() && !correcting {
            house = self.house.extract(&typed.remainder);
        }
        if house.is_none() && !correcting {
            house = self
                .house
                .extract(&receipt.caption)
                .or_else(|| self.house.extract(&receipt.ocr_text));
        }

        let amount = match (&typed.amount, typed.bare_number) {
            (Some(explicit), _) => Some(explicit.clone()),
            (None, true) => Some(user.to_string()),
            (None, false) => self.amount.extract(&combined),
        };

        let transaction_id = (!user.is_empty())
            .then(|| self.txid.extract_typed(user))
            .flatten()
            .or_else(|| self.txid.extract(&combined));

        let month = self.resolve_month(&typed, user, receipt, &combined);

        let mut payment = ExtractedPayment {
            house_number: house.unwrap_or_default(),
            amount: amount.unwrap_or_default(),
            transaction_id: transaction_id.unwrap_or_default(),
            payer_name: self.payer.extract(&combined).unwrap_or_default(),
            beneficiary: self.beneficiary.extract(&combined).unwrap_or_default(),
            reason: classify_reason(&combined),
            month,
            payment_date: self.date.extract(&combined).unwrap_or_default(),
        };

        if req.edit_mode {
            if let Some(previous) = req.previous {
                carry_over(&mut payment, previous);
            }
        }
        if let Some(registry) = req.registry {
            apply_occupant(&mut payment, registry);
        }

        tracing::info!(
            house = %payment.house_number,
            amount = %payment.amount,
            txid = %payment.transaction_id,
            month = ?payment.month,
            reason = %payment.reason,
            beneficiary = %payment.beneficiary,
            edit_mode = req.edit_mode,
            "extraction complete"
        );
        payment
    }

    /// Extraction for one message: a photo with an optional caption.
    ///
    /// With no house number anywhere, the registry is searched for the payer
    /// name, then for any occupant name printed on the receipt.
    pub fn extract_single(
        &self,
        text: &str,
        caption: &str,
        registry: Option<&HouseRegistry>,
    ) -> ExtractedPayment {
        let receipt = ReceiptText {
            ocr_text: text.to_string(),
            caption: caption.to_string(),
            user_text: String::new(),
        };
        let combined = receipt.combined();

        let mut house = self
            .house
            .extract(caption)
            .or_else(|| self.house.extract(&combined))
            .unwrap_or_default();
        let mut payer = self.payer.extract(&combined).unwrap_or_default();

        if let Some(registry) = registry {
            if house.is_empty() && !payer.is_empty() {
                let wanted = payer.to_uppercase();
                if let Some(found) = registry
                    .sorted_numbers()
                    .into_iter()
                    .find(|h| registry.occupant(h).is_some_and(|n| n.to_uppercase().contains(&wanted)))
                {
                    tracing::debug!(house = found, payer = %payer, "house from payer name");
                    house = found.to_string();
                }
            }
            if house.is_empty() {
                if let Some(found) = registry.find_house_by_name(&combined) {
                    tracing::debug!(house = found, "house from occupant name in text");
                    house = found.to_string();
                }
            }
            if let Some(name) = registry.occupant(&house) {
                payer = name.to_string();
            }
        }

        ExtractedPayment {
            house_number: house,
            amount: self.amount.extract(&combined).unwrap_or_default(),
            transaction_id: self.txid.extract(&combined).unwrap_or_default(),
            payer_name: payer,
            beneficiary: self.beneficiary.extract(&combined).unwrap_or_default(),
            reason: classify_reason(&combined),
            month: convert_to_ethiopian_month(&combined),
            payment_date: self.date.extract(&combined).unwrap_or_default(),
        }
    }

    fn typed_fields(&self, user: &str, edit_mode: bool) -> TypedFields {
        if user.is_empty() {
            return TypedFields::default();
        }
        let capture = |re: &Regex| re.captures(user).map(|c| c[1].to_string());
        let numeric = |a: &str| parse_amount(a).is_some_and(|v| v > 0.0);
        let mut remainder = user.to_string();
        for re in [&self.labels.amount, &self.labels.amount_suffix, &self.labels.month] {
            remainder = re.replace_all(&remainder, " ").into_owned();
        }
        TypedFields {
            amount: capture(&self.labels.amount)
                .or_else(|| capture(&self.labels.amount_suffix))
                .filter(|a| numeric(a)),
            house: capture(&self.labels.house),
            month_word: capture(&self.labels.month),
            bare_number: edit_mode && self.labels.bare_number.is_match(user) && numeric(user),
            remainder,
        }
    }

    fn resolve_month(
        &self,
        typed: &TypedFields,
        user: &str,
        receipt: &ReceiptText,
        combined: &str,
    ) -> Option<EthiopianMonth> {
        if let Some(word) = &typed.month_word {
            if let Some(month) = convert_to_ethiopian_month(word) {
                return Some(month);
            }
        }
        if !user.is_empty() && !typed.bare_number {
            if let Some(month) = convert_to_ethiopian_month(user) {
                return Some(month);
            }
        }
        convert_to_ethiopian_month(&receipt.caption).or_else(|| convert_to_ethiopian_month(combined))
    }
}

/// Edit mode: anything the correction did not say stays as it was.
fn carry_over(payment: &mut ExtractedPayment, previous: &ExtractedPayment) {
    fn keep(field: &mut String, old: &str) {
        if field.trim().is_empty() {
            *field = old.to_string();
        }
    }
    keep(&mut payment.house_number, &previous.house_number);
    keep(&mut payment.amount, &previous.amount);
    keep(&mut payment.transaction_id, &previous.transaction_id);
    keep(&mut payment.payer_name, &previous.payer_name);
    keep(&mut payment.beneficiary, &previous.beneficiary);
    keep(&mut payment.payment_date, &previous.payment_date);
    if payment.month.is_none() {
        payment.month = previous.month;
    }
    if payment.reason == PaymentReason::Other {
        payment.reason = previous.reason;
    }
}

fn apply_occupant(payment: &mut ExtractedPayment, registry: &HouseRegistry) {
    if let Some(name) = registry.occupant(&payment.house_number) {
        payment.payer_name = name.to_string();
    }
}
