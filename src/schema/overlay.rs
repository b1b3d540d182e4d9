//! Table-Filter Overlay: per-table corrections applied to the raw catalog
//! read, because the catalog alone under-specifies what natural key to use
//! for a handful of tables (no usable index, a sequence Postgres doesn't
//! report as owned, or a reference that should be rerouted to a more
//! useful table).

use super::{ONLY_IF_PARENT_EXISTS_TABLES, Table, UniqueIndex, VIRTUAL_INDEX_NAME};

/// Apply the static corrections for `table.name`, consuming and returning it.
///
/// Each arm corresponds 1:1 to a case in the original tool's table-filter
/// switch; table names and column names are load-bearing and must match the
/// actual schema exactly.
#[must_use]
pub fn apply_table_filters(mut table: Table) -> Table {
    match table.name.as_str() {
        "rhnchecksumtype" => table.sequence = Some("rhn_checksum_id_seq".to_string()),
        "rhnchecksum" => table.sequence = Some("rhnchecksum_seq".to_string()),
        "rhnpackagearch" => table.sequence = Some("rhn_package_arch_id_seq".to_string()),
        "rhnchannelarch" => table.sequence = Some("rhn_channel_arch_id_seq".to_string()),
        "rhnpackagename" => table.sequence = Some("RHN_PKG_NAME_SEQ".to_string()),
        "rhnpackagenevra" => table.sequence = Some("rhn_pkgnevra_id_seq".to_string()),
        "rhnpackagesource" => table.sequence = Some("rhn_package_source_id_seq".to_string()),
        "rhnpackageevr" => {
            table.sequence = Some("rhn_pkg_evr_seq".to_string());
            table.unexported_columns.push("type".to_string());
            for index_name in ["rhn_pe_v_r_e_uq", "rhn_pe_v_r_uq"] {
                if let Some(idx) = table.unique_indexes.iter_mut().find(|i| i.name == index_name) {
                    idx.columns.push("type".to_string());
                }
            }
        }
        "rhnpackage" => {
            table.sequence = Some("RHN_PACKAGE_ID_SEQ".to_string());
            install_virtual_index(
                &mut table,
                &["name_id", "evr_id", "package_arch_id", "checksum_id", "org_id"],
            );
        }
        "rhnpackagechangelogdata" => {
            table.sequence = Some("rhn_pkg_cld_id_seq".to_string());
            install_virtual_index(&mut table, &["name", "text", "time"]);
        }
        "rhnpackagechangelogrec" => table.sequence = Some("rhn_pkg_cl_id_seq".to_string()),
        "rhnpackagecapability" => {
            // Real unique indexes exist but are too complex to be useful
            // since we do nothing on conflict; a virtual index covering
            // the columns we actually care about is simpler and sufficient.
            table.sequence = Some("RHN_PKG_CAPABILITY_ID_SEQ".to_string());
            install_virtual_index(&mut table, &["name", "version"]);
        }
        "rhnconfigfiletype" => install_virtual_index(&mut table, &["label"]),
        "rhnconfigfile" => table.unexported_columns.push("latest_config_revision_id".to_string()),
        "rhnconfigcontent" => install_virtual_index(
            &mut table,
            &[
                "contents",
                "file_size",
                "checksum_id",
                "is_binary",
                "delim_start",
                "delim_end",
                "created",
            ],
        ),
        "suseimageinfo" => {
            for col in ["build_action_id", "inspect_action_id", "build_server_id"] {
                table.unexported_columns.push(col.to_string());
            }
            // Images only carry an id-only unique constraint, which isn't
            // enough to match rows across servers; approximate a natural
            // key with the closest compound of descriptive columns.
            install_virtual_index(
                &mut table,
                &["name", "version", "image_type", "image_arch_id", "org_id"],
            );
        }
        "suseimageinfochannel" => {
            install_virtual_index(&mut table, &["channel_id", "image_info_id"]);
        }
        "suseimageprofile" => {
            table.sequence = Some("suse_imgprof_prid_seq".to_string());
            // rhnregtoken has no usable natural key on its own; reroute the
            // reference to rhnactivationkey, which shares the same id space.
            for reference in &mut table.references {
                if reference.referenced_table == "rhnregtoken" {
                    reference.referenced_table = "rhnactivationkey".to_string();
                    for (local, remote) in &mut reference.column_pairs {
                        if local == "token_id" {
                            *remote = "reg_token_id".to_string();
                        }
                    }
                }
            }
        }
        "susekiwiprofile" => install_virtual_index(&mut table, &["profile_id"]),
        _ => {}
    }

    table.only_if_parent_exists = ONLY_IF_PARENT_EXISTS_TABLES.contains(&table.name.as_str());
    table
}

fn install_virtual_index(table: &mut Table, columns: &[&str]) {
    let index = UniqueIndex {
        name: VIRTUAL_INDEX_NAME.to_string(),
        columns: columns.iter().map(|c| (*c).to_string()).collect(),
    };
    table.unique_indexes.retain(|i| i.name != VIRTUAL_INDEX_NAME);
    table.unique_indexes.push(index);
    table.main_unique_index = Some(table.unique_indexes.len() - 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Reference, Table};

    fn bare_table(name: &str) -> Table {
        Table {
            name: name.to_string(),
            columns: vec![Column {
                name: "id".to_string(),
                data_type: "numeric".to_string(),
                nullable: false,
            }],
            primary_key: vec!["id".to_string()],
            sequence: None,
            unique_indexes: vec![],
            main_unique_index: None,
            references: vec![],
            unexported_columns: vec![],
            only_if_parent_exists: false,
        }
    }

    #[test]
    fn installs_virtual_index_for_rhnpackage() {
        let table = apply_table_filters(bare_table("rhnpackage"));
        let idx = table.main_unique_index().expect("virtual index installed");
        assert_eq!(idx.name, VIRTUAL_INDEX_NAME);
        assert_eq!(
            idx.columns,
            vec!["name_id", "evr_id", "package_arch_id", "checksum_id", "org_id"]
        );
        assert_eq!(table.sequence.as_deref(), Some("RHN_PACKAGE_ID_SEQ"));
    }

    #[test]
    fn unexports_latest_config_revision_on_rhnconfigfile() {
        let table = apply_table_filters(bare_table("rhnconfigfile"));
        assert!(!table.is_exported("latest_config_revision_id"));
        assert!(table.is_exported("id"));
    }

    #[test]
    fn marks_only_if_parent_exists_tables() {
        let table = apply_table_filters(bare_table("suseproductchannel"));
        assert!(table.only_if_parent_exists);
        let other = apply_table_filters(bare_table("rhnchannel"));
        assert!(!other.only_if_parent_exists);
    }

    #[test]
    fn reroutes_suseimageprofile_regtoken_reference() {
        let mut table = bare_table("suseimageprofile");
        table.references.push(Reference {
            referenced_table: "rhnregtoken".to_string(),
            column_pairs: vec![("token_id".to_string(), "id".to_string())],
        });
        let table = apply_table_filters(table);
        let r = &table.references[0];
        assert_eq!(r.referenced_table, "rhnactivationkey");
        assert_eq!(r.column_pairs[0].1, "reg_token_id");
    }
}
