use pretty_assertions::assert_eq;
use rtx_config_core::parse;

use super::{
    extract, extract_service, parse_bind_targets, L2tpAuth, L2tpIpPool, L2tpIpsec, L2tpKeepalive,
    L2tpService, L2tpTunnel, L2tpTunnelAuth, L2tpv3Config,
};

const PP_BLOCK: &str = "pp select anonymous
 pp bind tunnel1
 pp auth accept pap chap
 pp auth myname vpn secret
 ip pp remote address pool 192.168.1.200-192.168.1.210
";

const TUNNEL_BLOCK: &str = "tunnel select 1
 tunnel encapsulation l2tp
 ipsec tunnel 101
  ipsec ike pre-shared-key 1 text psk1
 l2tp keepalive use on 10 3
 l2tp tunnel disconnect time off
tunnel enable 1
";

fn lns_tunnel() -> L2tpTunnel {
    L2tpTunnel {
        id: 1,
        name: None,
        hostname: None,
        version: Some("l2tp".to_string()),
        mode: Some("lns".to_string()),
        enabled: true,
        tunnel_source: None,
        tunnel_destination: None,
        tunnel_destination_type: None,
        authentication: Some(L2tpAuth {
            methods: vec!["pap".to_string(), "chap".to_string()],
            username: Some("vpn".to_string()),
            password: Some("secret".to_string()),
        }),
        ip_pool: Some(L2tpIpPool {
            start: "192.168.1.200".to_string(),
            end: "192.168.1.210".to_string(),
        }),
        ipsec_profile: Some(L2tpIpsec {
            tunnel_id: 101,
            pre_shared_key: Some("psk1".to_string()),
        }),
        l2tpv3: None,
        keepalive: Some(L2tpKeepalive {
            interval: 10,
            retry: 3,
        }),
        disconnect_time: Some(0),
        always_on: false,
    }
}

#[test]
fn pp_and_tunnel_blocks_merge_into_one_record() {
    let raw = format!("{PP_BLOCK}{TUNNEL_BLOCK}l2tp service on l2tp\n");
    assert_eq!(extract(&parse(&raw)), vec![lns_tunnel()]);
}

#[test]
fn block_order_does_not_change_the_result() {
    let pp_first = format!("{PP_BLOCK}{TUNNEL_BLOCK}l2tp service on\n");
    let tunnel_first = format!("{TUNNEL_BLOCK}{PP_BLOCK}l2tp service on\n");
    assert_eq!(extract(&parse(&pp_first)), extract(&parse(&tunnel_first)));
}

#[test]
fn tunnel_mode_survives_a_bound_anonymous_pp() {
    let pp = "pp select anonymous\n pp bind tunnel1\n pp auth accept chap\n pp auth myname vpn secret\n";
    let tunnel = "tunnel select 1\n tunnel encapsulation l2tpv3\n l2tp hostname branch-a\ntunnel enable 1\n";

    let pp_first = extract(&parse(&format!("{pp}{tunnel}")));
    let tunnel_first = extract(&parse(&format!("{tunnel}{pp}")));
    assert_eq!(pp_first, tunnel_first);

    assert_eq!(pp_first.len(), 1);
    let t = &pp_first[0];
    assert_eq!(t.id, 1);
    assert_eq!(t.version.as_deref(), Some("l2tpv3"));
    assert_eq!(t.mode.as_deref(), Some("l2vpn"));
    assert_eq!(t.hostname.as_deref(), Some("branch-a"));
    assert_eq!(
        t.authentication.as_ref().and_then(|a| a.username.as_deref()),
        Some("vpn")
    );
}

#[test]
fn unbound_anonymous_pp_becomes_record_zero() {
    let tunnels = extract(&parse("pp select anonymous\n pp auth accept chap"));

    assert_eq!(tunnels.len(), 1);
    assert_eq!(tunnels[0].id, 0);
    assert_eq!(tunnels[0].mode.as_deref(), Some("lns"));
    assert_eq!(tunnels[0].version.as_deref(), Some("l2tp"));
    assert!(!tunnels[0].enabled);
    assert_eq!(
        tunnels[0].authentication.as_ref().map(|a| a.methods.clone()),
        Some(vec!["chap".to_string()])
    );
}

#[test]
fn bind_ranges_expand_to_every_tunnel() {
    assert_eq!(parse_bind_targets("tunnel1-tunnel3 tunnel7"), vec![1, 2, 3, 7]);
    assert_eq!(parse_bind_targets("tunnel4-tunnel2 lan1"), Vec::<u32>::new());
    assert_eq!(parse_bind_targets("tunnel2999-tunnel3000"), vec![2999, 3000]);

    let raw = "pp select anonymous\n pp bind tunnel1-tunnel2\n ip pp remote address pool 10.0.0.10-10.0.0.20";
    let tunnels = extract(&parse(raw));
    let ids: Vec<_> = tunnels.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(tunnels.iter().all(|t| t.ip_pool.is_some()));
}

#[test]
fn oversized_bind_ranges_are_ignored() {
    assert_eq!(parse_bind_targets("tunnel1-tunnel200000000 tunnel5"), vec![5]);
    assert_eq!(parse_bind_targets("tunnel3001"), Vec::<u32>::new());

    let raw = "pp select anonymous\n pp bind tunnel1-tunnel4294967295\n pp auth accept chap";
    let tunnels = extract(&parse(raw));
    assert_eq!(tunnels.len(), 1);
    assert_eq!(tunnels[0].id, 0);
}

#[test]
fn enablement_requires_an_explicit_switch() {
    let raw = "tunnel select 2\n tunnel encapsulation l2tp\n\
               tunnel select 3\n tunnel encapsulation l2tp\n\
               tunnel select 4\n tunnel encapsulation l2tp\n\
               tunnel enable 3\ntunnel enable 4\ntunnel disable 4";
    let enabled: Vec<_> = extract(&parse(raw)).iter().map(|t| (t.id, t.enabled)).collect();
    assert_eq!(enabled, vec![(2, false), (3, true), (4, false)]);
}

#[test]
fn ipsec_only_tunnels_are_not_l2tp() {
    let raw = "tunnel select 5\n ipsec tunnel 105\n  ipsec sa policy 105 5 esp aes-cbc sha-hmac\ntunnel enable 5";
    assert!(extract(&parse(raw)).is_empty());
}

#[test]
fn l2tpv3_pseudo_wire() {
    let raw = "tunnel select 3
 description tunnel site-b
 tunnel encapsulation l2tpv3
 tunnel endpoint address 203.0.113.1 198.51.100.7
 l2tp always-on on
 l2tp hostname branch-a
 l2tp tunnel auth on v3secret
 l2tp local router-id 10.255.0.1
 l2tp remote router-id 10.255.0.2
 l2tp remote end-id site-b
 l2tp keepalive use off
 l2tp tunnel disconnect time 900
";
    let tunnels = extract(&parse(raw));
    assert_eq!(tunnels.len(), 1);
    let t = &tunnels[0];

    assert_eq!(t.name.as_deref(), Some("site-b"));
    assert_eq!(t.version.as_deref(), Some("l2tpv3"));
    assert_eq!(t.mode.as_deref(), Some("l2vpn"));
    assert_eq!(t.tunnel_source.as_deref(), Some("203.0.113.1"));
    assert_eq!(t.tunnel_destination.as_deref(), Some("198.51.100.7"));
    assert_eq!(t.tunnel_destination_type.as_deref(), Some("ip"));
    assert_eq!(t.hostname.as_deref(), Some("branch-a"));
    assert!(t.always_on);
    assert_eq!(t.keepalive, None);
    assert_eq!(t.disconnect_time, Some(900));
    assert_eq!(
        t.l2tpv3,
        Some(L2tpv3Config {
            local_router_id: Some("10.255.0.1".to_string()),
            remote_router_id: Some("10.255.0.2".to_string()),
            remote_end_id: Some("site-b".to_string()),
            tunnel_auth: Some(L2tpTunnelAuth {
                enabled: true,
                password: Some("v3secret".to_string()),
            }),
        })
    );
}

#[test]
fn endpoint_name_defaults_to_fqdn() {
    let raw = "tunnel select 4\n tunnel encapsulation l2tpv3\n tunnel endpoint name peer.example.jp";
    let tunnels = extract(&parse(raw));
    assert_eq!(tunnels[0].tunnel_destination.as_deref(), Some("peer.example.jp"));
    assert_eq!(tunnels[0].tunnel_destination_type.as_deref(), Some("fqdn"));
}

#[test]
fn service_switch() {
    assert_eq!(extract_service(&parse("ip lan1 address 192.168.1.1/24")), None);
    assert_eq!(
        extract_service(&parse("l2tp service on l2tpv3 l2tp")),
        Some(L2tpService {
            enabled: true,
            protocols: vec!["l2tpv3".to_string(), "l2tp".to_string()],
        })
    );
    assert_eq!(
        extract_service(&parse("l2tp service off l2tp")),
        Some(L2tpService {
            enabled: false,
            protocols: Vec::new(),
        })
    );
}
