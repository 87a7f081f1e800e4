use super::*;

#[derive(Debug, Clone, PartialEq)]
struct Desc {
    size: u64,
}

#[test]
fn test_new_resource_is_uncreated() {
    let res: Resource<Desc, u32> = Resource::new(Desc { size: 64 });
    assert_eq!(res.state(), ResourceState::Uncreated);
    assert!(!res.is_initialized());
    assert!(res.native().is_none());
    assert_eq!(res.description(), &Desc { size: 64 });
}

#[test]
fn test_full_lifecycle() {
    let mut res: Resource<Desc, u32> = Resource::new(Desc { size: 64 });

    res.begin_init();
    assert_eq!(res.state(), ResourceState::Initializing);
    assert!(!res.is_initialized());

    res.finish_init(7);
    assert_eq!(res.state(), ResourceState::Live);
    assert!(res.is_initialized());
    assert_eq!(res.native(), Some(&7));

    assert_eq!(res.begin_deinit(), Some(7));
    assert_eq!(res.state(), ResourceState::Destroying);
    assert!(!res.is_initialized());

    res.finish_deinit();
    assert_eq!(res.state(), ResourceState::Destroyed);
    // Descriptor survives the whole lifecycle untouched
    assert_eq!(res.description().size, 64);
}

#[test]
fn test_debug_name() {
    let mut res: Resource<Desc, ()> = Resource::new(Desc { size: 1 });
    assert!(res.debug_name().is_none());
    res.set_debug_name("ShadowMap");
    assert_eq!(res.debug_name(), Some("ShadowMap"));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic]
fn test_skipping_init_panics_in_debug() {
    let mut res: Resource<Desc, u32> = Resource::new(Desc { size: 1 });
    res.finish_init(1);
}
