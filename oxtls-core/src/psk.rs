//! Pre-shared keys: offer selection, identities, and binders
//! (RFC 8446 Sections 4.2.9, 4.2.11, 4.6.1).
//!
//! Two PSK sources exist: a session ticket from a prior connection and a
//! statically configured external PSK. When both are offerable the ticket
//! is listed first; the server's `selected_identity` is interpreted against
//! that same order.

use crate::cipher::CipherSuite;
use crate::codec::{put_vector16, put_vector8, Reader};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::key_schedule::hkdf_expand_label;
use bytes::{BufMut, BytesMut};
use oxtls_crypto::{CryptoProvider, HashAlgorithm};
use zeroize::Zeroizing;

/// Ticket permission flags, initialised from the PSK modes the ticket may
/// be used with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketFlags(u8);

impl TicketFlags {
    /// Ticket may resume with pure-PSK key exchange.
    pub const ALLOW_PSK: TicketFlags = TicketFlags(1 << 0);
    /// Ticket may resume with PSK + (EC)DHE key exchange.
    pub const ALLOW_PSK_EPHEMERAL: TicketFlags = TicketFlags(1 << 1);
    /// Ticket permits early data.
    pub const ALLOW_EARLY_DATA: TicketFlags = TicketFlags(1 << 2);

    /// Combine flags.
    pub fn union(self, other: TicketFlags) -> TicketFlags {
        TicketFlags(self.0 | other.0)
    }

    /// Check whether all bits of `other` are set.
    pub fn contains(self, other: TicketFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags derived from the locally enabled key-exchange modes.
    pub fn from_modes(modes: &crate::config::KeyExchangeModes) -> TicketFlags {
        let mut flags = TicketFlags::default();
        if modes.psk {
            flags = flags.union(TicketFlags::ALLOW_PSK);
        }
        if modes.psk_ephemeral {
            flags = flags.union(TicketFlags::ALLOW_PSK_EPHEMERAL);
        }
        flags
    }

    /// Whether this ticket permits at least one of the locally enabled PSK
    /// modes.
    pub fn permits_any_mode(self, modes: &crate::config::KeyExchangeModes) -> bool {
        (modes.psk && self.contains(TicketFlags::ALLOW_PSK))
            || (modes.psk_ephemeral && self.contains(TicketFlags::ALLOW_PSK_EPHEMERAL))
    }
}

/// Session ticket retained from a prior connection.
pub struct StoredTicket {
    /// Opaque ticket blob (the PSK identity on the wire).
    pub ticket: Vec<u8>,
    /// PSK derived from the resumption master secret and ticket nonce.
    pub psk: Zeroizing<Vec<u8>>,
    /// Cipher suite of the original connection.
    pub cipher_suite: CipherSuite,
    /// Seconds since the UNIX epoch when the ticket arrived, if a clock
    /// was available.
    pub received_at: Option<u64>,
    /// Ticket lifetime in seconds.
    pub lifetime: u32,
    /// Age obfuscation value from the ticket.
    pub age_add: u32,
    /// Permission flags.
    pub flags: TicketFlags,
}

impl std::fmt::Debug for StoredTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTicket")
            .field("ticket_len", &self.ticket.len())
            .field("cipher_suite", &self.cipher_suite)
            .field("lifetime", &self.lifetime)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl StoredTicket {
    /// Check whether the ticket is still within its lifetime.
    pub fn is_valid(&self, now: Option<u64>) -> bool {
        match (self.received_at, now) {
            (Some(received), Some(now)) => now.saturating_sub(received) < self.lifetime as u64,
            // No clock on either end: offer and let the server decide
            _ => true,
        }
    }

    /// Obfuscated ticket age for the PSK identity.
    ///
    /// Age in seconds minus one (floored at zero, compensating sub-second
    /// rounding against millisecond server clocks), times 1000, plus
    /// `ticket_age_add`, truncated to 32 bits. Without a clock the age is
    /// zero (plus the obfuscation constant).
    pub fn obfuscated_age(&self, now: Option<u64>) -> u32 {
        let mut age_secs = match (self.received_at, now) {
            (Some(received), Some(now)) => now.saturating_sub(received) as u32,
            _ => 0,
        };
        if age_secs > 0 {
            age_secs -= 1;
        }
        age_secs
            .wrapping_mul(1000)
            .wrapping_add(self.age_add)
    }

    /// Hash algorithm of this ticket's cipher suite.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.cipher_suite.hash_algorithm()
    }
}

/// Statically configured out-of-band PSK.
pub struct ExternalPsk {
    /// PSK identity.
    pub identity: Vec<u8>,
    /// PSK secret.
    pub secret: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for ExternalPsk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalPsk")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl ExternalPsk {
    /// Create a new external PSK.
    pub fn new(identity: Vec<u8>, secret: Vec<u8>) -> Self {
        Self {
            identity,
            secret: Zeroizing::new(secret),
        }
    }

    /// External PSKs are bound to SHA-256 by convention.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Sha256
    }
}

/// One PSK the client will offer, in offer order.
pub struct OfferedPsk {
    /// Identity bytes for the wire.
    pub identity: Vec<u8>,
    /// Obfuscated ticket age (0 for external PSKs).
    pub obfuscated_age: u32,
    /// The PSK secret.
    pub secret: Zeroizing<Vec<u8>>,
    /// Hash algorithm of the binder for this PSK.
    pub hash_algorithm: HashAlgorithm,
    /// External PSK (vs resumption ticket).
    pub is_external: bool,
}

impl std::fmt::Debug for OfferedPsk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfferedPsk")
            .field("identity_len", &self.identity.len())
            .field("is_external", &self.is_external)
            .finish_non_exhaustive()
    }
}

/// Enumerate the PSKs the client can offer, ticket first.
///
/// A ticket is offerable when resumption is enabled, the blob is
/// non-empty, its flags permit at least one locally enabled PSK mode, and
/// it has not expired against the configured clock.
pub fn offered_psks(config: &ClientConfig) -> Vec<OfferedPsk> {
    let mut offers = Vec::new();
    if !config.key_exchange_modes.any_psk() {
        return offers;
    }

    let now = config.clock.as_ref().map(|c| c.now_secs());

    if config.enable_resumption {
        if let Some(ticket) = &config.ticket {
            if !ticket.ticket.is_empty()
                && ticket.flags.permits_any_mode(&config.key_exchange_modes)
                && ticket.is_valid(now)
            {
                offers.push(OfferedPsk {
                    identity: ticket.ticket.clone(),
                    obfuscated_age: ticket.obfuscated_age(now),
                    secret: ticket.psk.clone(),
                    hash_algorithm: ticket.hash_algorithm(),
                    is_external: false,
                });
            }
        }
    }

    if let Some(psk) = &config.external_psk {
        offers.push(OfferedPsk {
            identity: psk.identity.clone(),
            obfuscated_age: 0,
            secret: psk.secret.clone(),
            hash_algorithm: psk.hash_algorithm(),
            is_external: true,
        });
    }

    offers
}

/// PSK identity as it appears in the pre_shared_key extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity {
    /// Opaque identity value.
    pub identity: Vec<u8>,
    /// Obfuscated ticket age.
    pub obfuscated_ticket_age: u32,
}

impl PskIdentity {
    /// Encode to wire format.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        put_vector16(buf, &self.identity)?;
        buf.put_u32(self.obfuscated_ticket_age);
        Ok(())
    }

    /// Decode from wire format.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let identity = r.read_vector16(1, u16::MAX as usize)?.to_vec();
        let obfuscated_ticket_age = r.read_u32()?;
        Ok(Self {
            identity,
            obfuscated_ticket_age,
        })
    }
}

/// A PSK binder value.
#[derive(Debug, Clone)]
pub struct PskBinder {
    /// HMAC over the truncated-ClientHello transcript hash.
    pub binder: Vec<u8>,
}

impl PskBinder {
    /// Compute the binder for one offered PSK.
    ///
    /// RFC 8446 Section 4.2.11.2:
    /// ```text
    /// binder_key   = Derive-Secret(early_secret,
    ///                              "ext binder" | "res binder", "")
    /// finished_key = HKDF-Expand-Label(binder_key, "finished", "", Hash.len)
    /// binder       = HMAC(finished_key, transcript_hash)
    /// ```
    /// where `transcript_hash` covers the ClientHello up to (excluding)
    /// the binders list.
    pub fn compute(
        provider: &dyn CryptoProvider,
        psk: &OfferedPsk,
        transcript_hash: &[u8],
    ) -> Result<Self> {
        let hash_algorithm = psk.hash_algorithm;
        let hash_len = hash_algorithm.output_size();

        let kdf = provider.kdf(hash_algorithm.to_kdf_algorithm())?;
        let salt = vec![0u8; hash_len];
        let early_secret = Zeroizing::new(kdf.extract(&salt, &psk.secret));

        let empty_hash = {
            let hasher = provider.hash(hash_algorithm)?;
            hasher.finalize()
        };
        let label: &[u8] = if psk.is_external {
            b"ext binder"
        } else {
            b"res binder"
        };
        let binder_key = Zeroizing::new(hkdf_expand_label(
            provider,
            hash_algorithm,
            &early_secret,
            label,
            &empty_hash,
            hash_len,
        )?);
        let finished_key = Zeroizing::new(hkdf_expand_label(
            provider,
            hash_algorithm,
            &binder_key,
            b"finished",
            &[],
            hash_len,
        )?);

        let mut hmac = provider.hmac(hash_algorithm, &finished_key)?;
        hmac.update(transcript_hash);
        Ok(Self {
            binder: hmac.finalize(),
        })
    }

    /// Encode as `<len:u8><binder>`.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        if self.binder.len() < 32 {
            return Err(Error::InternalError("binder shorter than minimum".into()));
        }
        put_vector8(buf, &self.binder)
    }
}

/// The client-side pre_shared_key extension body.
#[derive(Debug, Clone)]
pub struct PreSharedKeyExtension {
    /// Offered identities, in offer order.
    pub identities: Vec<PskIdentity>,
    /// Binder lengths, one per identity (the bytes are patched in later).
    pub binder_lens: Vec<usize>,
}

impl PreSharedKeyExtension {
    /// Build the identity list for the offered PSKs, reserving binder
    /// space.
    pub fn for_offers(offers: &[OfferedPsk]) -> Result<Self> {
        if offers.is_empty() {
            return Err(Error::InternalError(
                "pre_shared_key requires at least one identity".into(),
            ));
        }
        let identities = offers
            .iter()
            .map(|o| PskIdentity {
                identity: o.identity.clone(),
                obfuscated_ticket_age: o.obfuscated_age,
            })
            .collect();
        let binder_lens = offers
            .iter()
            .map(|o| o.hash_algorithm.output_size())
            .collect();
        Ok(Self {
            identities,
            binder_lens,
        })
    }

    /// Total size of the binders list (its two-byte length prefix plus one
    /// length-prefixed binder per identity).
    pub fn binders_list_len(&self) -> usize {
        2 + self
            .binder_lens
            .iter()
            .map(|len| 1 + len)
            .sum::<usize>()
    }

    /// Encode the extension body with all binder bytes zeroed.
    ///
    /// The ClientHello writer hashes everything before the binders list,
    /// computes the real binders, and overwrites the reserved bytes.
    pub fn encode_with_zeroed_binders(&self, buf: &mut BytesMut) -> Result<()> {
        let mut identities = BytesMut::new();
        for identity in &self.identities {
            identity.encode_into(&mut identities)?;
        }
        put_vector16(buf, &identities)?;

        let mut binders = BytesMut::new();
        for len in &self.binder_lens {
            put_vector8(&mut binders, &vec![0u8; *len])?;
        }
        put_vector16(buf, &binders)?;
        Ok(())
    }
}

/// Derive the resumption PSK for a ticket
/// (RFC 8446 Section 4.6.1).
///
/// `PSK = HKDF-Expand-Label(resumption_master_secret, "resumption",
/// ticket_nonce, Hash.length)`
pub fn derive_resumption_psk(
    provider: &dyn CryptoProvider,
    hash_algorithm: HashAlgorithm,
    resumption_master_secret: &[u8],
    ticket_nonce: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    Ok(Zeroizing::new(hkdf_expand_label(
        provider,
        hash_algorithm,
        resumption_master_secret,
        b"resumption",
        ticket_nonce,
        hash_algorithm.output_size(),
    )?))
}
