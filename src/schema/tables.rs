//! Table-name lists for each entity kind.
//!
//! These mirror `SoftwareChannelTableNames`, `ProductsTableNames` and
//! `ConfigTableNames` from the original dumper: the set of tables considered
//! part of a "software channel" export, a "products" export, and a
//! "configuration channel" export, respectively.

/// Name of the synthesized unique index the overlay installs for tables
/// whose natural key isn't backed by a real Postgres unique index.
pub const VIRTUAL_INDEX_NAME: &str = "virtual_main_unique_index";

/// Tables cleaned (pruned of rows the source no longer has) after each
/// channel export, keyed to `rhnchannel.id` as the clean scope.
pub const CLEANABLE_CHANNEL_TABLES: &[&str] = &[
    "rhnreleasechannelmap",
    "rhndistchannelmap",
    "rhnchannelerrata",
    "rhnchannelpackage",
    "rhnerratapackage",
    "rhnerratafile",
    "rhnerratafilechannel",
    "rhnerratafilepackage",
    "rhnerratafilepackagesource",
    "rhnerratabuglist",
    "rhnerratacve",
    "rhnerratakeyword",
    "susemddata",
    "susemdkeyword",
    "suseproductchannel",
];

/// Tables only ever inserted when the natural-key-matching parent already
/// exists on the target; no row is synthesized to satisfy them.
pub const ONLY_IF_PARENT_EXISTS_TABLES: &[&str] =
    &["rhnchannelcloned", "rhnerratacloned", "suseproductchannel"];

/// Tables carried with every software channel export, independent of the
/// specific channel (its packages, errata, clones, and their ancillary data).
#[must_use]
pub fn software_channel_table_names() -> Vec<&'static str> {
    vec![
        "rhnchannel",
        "rhnchannelarch",
        "rhnchannelfamily",
        "rhnchannelfamilymembers",
        "rhnchannelcloned",
        "rhnreleasechannelmap",
        "rhndistchannelmap",
        "rhnchannelerrata",
        "rhnchannelpackage",
        "rhnpackage",
        "rhnpackagename",
        "rhnpackageevr",
        "rhnpackagearch",
        "rhnpackagenevra",
        "rhnpackagesource",
        "rhnchecksumtype",
        "rhnchecksum",
        "rhnpackagecapability",
        "rhnpackageprovides",
        "rhnpackagerequires",
        "rhnpackageconflicts",
        "rhnpackageobsoletes",
        "rhnpackagerecommends",
        "rhnpackagesuggests",
        "rhnpackagesupplements",
        "rhnpackageenhances",
        "rhnpackagebreaks",
        "rhnpackagepredepends",
        "rhnerrata",
        "rhnerrataseverity",
        "rhnerratacloned",
        "rhnerratapackage",
        "rhnerratafile",
        "rhnerratafilechannel",
        "rhnerratafilepackage",
        "rhnerratafilepackagesource",
        "rhnerratabuglist",
        "rhnerratacve",
        "rhnerratakeyword",
        "rhncve",
        "rhnbugzillabuglist",
        "rhnpackagechangelogdata",
        "rhnpackagechangelogrec",
        "suseproductchannel",
        "susemddata",
        "susemdkeyword",
    ]
}

/// Product/channel-family tables carried once, ahead of any per-channel
/// export (they are shared across channels, so crawling them per channel
/// would duplicate work and risk ordering conflicts).
#[must_use]
pub fn products_table_names() -> Vec<&'static str> {
    vec![
        "suseproducts",
        "suseproductextension",
        "suseproductsccrepository",
        "susesccrepository",
        "suseupgradepath",
        "rhnchannelfamily",
        "rhnpublicchannelfamily",
    ]
}

/// Tables carried with a configuration channel export.
#[must_use]
pub fn config_channel_table_names() -> Vec<&'static str> {
    vec![
        "rhnconfigchannel",
        "rhnconfigfilename",
        "rhnconfigfiletype",
        "rhnconfiginfo",
        "rhnconfigfile",
        "rhnconfigrevision",
        "rhnconfigcontent",
        "rhnchecksum",
        "rhnregtokenconfigchannels",
        "rhnserverconfigchannel",
        "rhnsnapshotconfigchannel",
        "susestaterevisionconfigchannel",
        "rhnconfigfilefailure",
    ]
}

/// Tables carried with an OS image or container image export. The SQL
/// statements produced here cover only the database-side registration of
/// an image; the image/layer blobs themselves travel out of band via
/// `rsync` (see `sync::blobs`).
#[must_use]
pub fn image_table_names() -> Vec<&'static str> {
    vec![
        "suseimageinfo",
        "suseimageinfochannel",
        "suseimageprofile",
        "susekiwiprofile",
        "rhnchecksum",
        "rhnchecksumtype",
    ]
}

/// `suseimageinfo.image_type` value selecting OS (kiwi) images for
/// `--osImages`, as opposed to `--containers`' `"docker"`.
pub const OS_IMAGE_TYPE: &str = "kiwi";

/// `suseimageinfo.image_type` value selecting container images for
/// `--containers`.
pub const CONTAINER_IMAGE_TYPE: &str = "docker";
