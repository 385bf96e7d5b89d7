//! The embedded catalog assets, exercised through the crate's public API
//! the way `main` uses them, rather than through any one table's own
//! unit tests.

use cou::catalog::{Catalog, OpenStackRelease};

#[test]
fn default_catalog_loads_and_orders_every_known_codename() {
    let catalog = Catalog::load_default().unwrap();
    let ussuri = OpenStackRelease::parse("ussuri").unwrap();
    let caracal = OpenStackRelease::parse("caracal").unwrap();
    assert!(ussuri < caracal);
    assert_eq!(caracal, OpenStackRelease::newest());
}

#[test]
fn ceph_release_mapping_round_trips_through_the_public_catalog() {
    let catalog = Catalog::load_default().unwrap();
    let yoga = OpenStackRelease::parse("yoga").unwrap();
    let ceph_release = catalog.charms.openstack_to_ceph_release(yoga).unwrap();
    assert_eq!(ceph_release, "quincy");

    // yoga, zed and antelope all ship quincy; the inverse takes the newest.
    let antelope = OpenStackRelease::parse("antelope").unwrap();
    assert_eq!(catalog.charms.ceph_release_to_openstack(ceph_release).unwrap(), antelope);
}

#[test]
fn nova_compute_and_ceph_osd_are_always_data_plane() {
    let catalog = Catalog::load_default().unwrap();
    assert!(catalog.is_data_plane_charm("nova-compute"));
    assert!(catalog.is_data_plane_charm("ceph-osd"));
    assert!(!catalog.is_data_plane_charm("keystone"));
}

#[test]
fn unknown_release_csv_rows_are_rejected_at_load_time() {
    let err = Catalog::load(
        "charm,codename,version_lo,version_hi\nkeystone,not-a-codename,1.0.0,2.0.0\n",
        "charm,class\n",
        "charm,order\n",
        "codename,ceph_release\n",
        "charm,series,track,codename\n",
        "series,order,default_codename\nfocal,0,ussuri\n",
    );
    assert!(err.is_err());
}
